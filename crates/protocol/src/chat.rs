use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageDirection {
    #[default]
    #[serde(rename = "in")]
    Inbound,
    #[serde(rename = "out")]
    Outbound,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub direction: MessageDirection,
    pub body: String,
    pub at: Option<String>,
    pub from_agent: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChatMessagesResponse {
    pub messages: Vec<ChatMessage>,
    pub takeover: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SendChatMessage {
    pub body: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TakeoverRequest {
    pub enabled: bool,
}
