use protocol::{SessionSnapshot, SessionStatus};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

pub(crate) const CONNECTED_PLACEHOLDER: &str = "connected";

/// Identity of the workspace a request was issued for.
///
/// A result is applied only while `generation` still matches the active
/// selection; switching workspace cancels `cancel`, aborting in-flight work.
#[derive(Clone, Debug)]
pub(crate) struct WorkspaceContext {
    pub(crate) id: String,
    pub(crate) generation: u64,
    pub(crate) cancel: CancellationToken,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub(crate) enum QrDisplay {
    Image(String),
    Placeholder(String),
    Hidden,
}

/// Display fields derived from one session snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub(crate) struct StatusView {
    pub(crate) workspace_id: String,
    pub(crate) status: SessionStatus,
    pub(crate) status_text: String,
    pub(crate) qr: QrDisplay,
    pub(crate) recipients_count: u64,
    pub(crate) has_scheduler: bool,
    pub(crate) elapsed_text: String,
    pub(crate) ready: bool,
    pub(crate) authenticated: bool,
    pub(crate) send_in_progress: bool,
    pub(crate) can_send: bool,
}

impl StatusView {
    pub(crate) fn from_snapshot(
        workspace_id: &str,
        snapshot: &SessionSnapshot,
        elapsed_secs: u64,
        client_send_in_flight: bool,
    ) -> Self {
        let qr = if snapshot.ready {
            QrDisplay::Placeholder(CONNECTED_PLACEHOLDER.to_string())
        } else {
            match snapshot.qr_data_url.as_deref().map(str::trim) {
                Some(url) if !url.is_empty() => QrDisplay::Image(url.to_string()),
                _ => QrDisplay::Hidden,
            }
        };
        Self {
            workspace_id: workspace_id.to_string(),
            status: snapshot.status,
            status_text: status_text(snapshot),
            qr,
            recipients_count: snapshot.recipients_count,
            has_scheduler: snapshot.has_scheduler,
            elapsed_text: elapsed_text(elapsed_secs),
            ready: snapshot.ready,
            authenticated: snapshot.authenticated,
            send_in_progress: snapshot.send_in_progress,
            can_send: can_send(snapshot.ready, snapshot.send_in_progress, client_send_in_flight),
        }
    }
}

pub(crate) fn can_send(ready: bool, workspace_sending: bool, client_send_in_flight: bool) -> bool {
    ready && !workspace_sending && !client_send_in_flight
}

pub(crate) fn elapsed_text(secs: u64) -> String {
    format!("Connect timer: {secs}s")
}

fn status_text(snapshot: &SessionSnapshot) -> String {
    let base = match snapshot.status {
        SessionStatus::Starting => "Starting session",
        SessionStatus::QrReady => "Scan the QR code to connect",
        SessionStatus::Authenticated => "Authenticated, finishing sync",
        SessionStatus::Ready => "Connected",
        SessionStatus::Stopped => "Stopped",
        SessionStatus::Error => "Error",
        SessionStatus::Unknown => "Unknown",
    };
    if snapshot.send_in_progress {
        format!("{base} (sending)")
    } else {
        base.to_string()
    }
}
