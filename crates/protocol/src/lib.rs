use serde::{Deserialize, Serialize};

pub mod auth;
pub mod campaign;
pub mod chat;
pub mod crm;
pub mod status;

pub use campaign::{CampaignOutcome, CampaignRequest, CampaignSendResponse, ScheduledSend};
pub use chat::{ChatMessage, ChatMessagesResponse, MessageDirection};
pub use status::{SessionSnapshot, SessionStatus};

/// Fields shared by every JSON body the CRM API returns.
///
/// The backend flattens payload fields next to these, so payload types are
/// decoded from the same object after the envelope has been checked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Envelope {
    /// Only an explicit `ok: false` marks a failure; a missing field does not.
    pub fn is_failure(&self) -> bool {
        self.ok == Some(false)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
    }
}
