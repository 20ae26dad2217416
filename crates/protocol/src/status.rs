use serde::{Deserialize, Serialize};

/// Connection state of a workspace's messaging session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Starting,
    QrReady,
    Authenticated,
    Ready,
    #[default]
    Stopped,
    Error,
    #[serde(other)]
    Unknown,
}

impl SessionStatus {
    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Starting => "starting",
            SessionStatus::QrReady => "qr_ready",
            SessionStatus::Authenticated => "authenticated",
            SessionStatus::Ready => "ready",
            SessionStatus::Stopped => "stopped",
            SessionStatus::Error => "error",
            SessionStatus::Unknown => "unknown",
        }
    }

    /// States in which the session is still working towards `ready`.
    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            SessionStatus::Starting | SessionStatus::QrReady | SessionStatus::Authenticated
        )
    }
}

/// Latest server-reported state of a workspace session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub ready: bool,
    pub authenticated: bool,
    pub send_in_progress: bool,
    pub connect_elapsed_sec: u64,
    pub recipients_count: u64,
    pub has_scheduler: bool,
    pub qr_data_url: Option<String>,
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    pub fn last_error(&self) -> Option<&str> {
        self.last_error
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
    }
}
