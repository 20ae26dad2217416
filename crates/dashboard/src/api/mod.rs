mod client;
mod endpoints;
mod http_utils;

use async_trait::async_trait;
use protocol::{CampaignRequest, CampaignSendResponse, ChatMessagesResponse, SessionSnapshot};

use crate::error::ApiError;

pub(crate) use client::ApiClient;

/// Backend calls the poll/reconcile runtime depends on.
#[async_trait]
pub(crate) trait SessionApi: Send + Sync {
    async fn workspace_status(&self, workspace_id: &str) -> Result<SessionSnapshot, ApiError>;

    async fn chat_messages(
        &self,
        workspace_id: &str,
        contact_id: &str,
    ) -> Result<ChatMessagesResponse, ApiError>;

    async fn send_campaign(
        &self,
        workspace_id: &str,
        request: &CampaignRequest,
    ) -> Result<CampaignSendResponse, ApiError>;

    /// Drops the bearer token held in memory.
    fn forget_credentials(&self);
}
