use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRequest {
    pub messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_at: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScheduledSend {
    pub id: Option<String>,
    pub send_at: String,
    pub recipients: Option<u64>,
    pub messages: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignSendResponse {
    pub scheduled: Option<ScheduledSend>,
    pub results: Vec<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CampaignOutcome {
    Scheduled(ScheduledSend),
    SentNow { results: usize },
}

impl CampaignSendResponse {
    /// A response is a deferred send purely because it carries `scheduled`.
    pub fn outcome(self) -> CampaignOutcome {
        match self.scheduled {
            Some(scheduled) => CampaignOutcome::Scheduled(scheduled),
            None => CampaignOutcome::SentNow {
                results: self.results.len(),
            },
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SchedulesResponse {
    pub schedules: Vec<ScheduledSend>,
}
