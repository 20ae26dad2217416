use std::path::Path;

use async_trait::async_trait;
use protocol::auth::{AuthResponse, LoginRequest, MeResponse, RegisterRequest, User};
use protocol::campaign::SchedulesResponse;
use protocol::chat::{SendChatMessage, TakeoverRequest};
use protocol::crm::{
    AdminPlanRequest, AdminSuspendRequest, Alert, AlertsResponse, AutomationSettings,
    BillingInfo, BillingResponse, ConfigDocument, CreateWorkspaceRequest, ImportResponse, Lead,
    LeadsResponse, MediaItem, MediaResponse, MediaUploadResponse, ReportDay, ReportResponse,
    SaveTemplateRequest, Template, TemplatesResponse, WorkspaceResponse, WorkspaceSummary,
    WorkspacesResponse,
};
use protocol::{
    CampaignRequest, CampaignSendResponse, ChatMessagesResponse, ScheduledSend, SessionSnapshot,
};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Url};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::ApiError;

use super::client::{decode_payload, ApiClient};
use super::http_utils::{segment, workspace_path};
use super::SessionApi;

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
const ADMIN_WORKSPACES: &str = "/api/workspaces/admin/workspaces";

impl ApiClient {
    pub(crate) async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        // A 401 here means bad credentials, not an expired session.
        self.post("/api/auth/login", &request)
            .await
            .map_err(|err| match err {
                ApiError::Unauthorized => ApiError::Server {
                    status: 401,
                    message: "Invalid email or password".to_string(),
                },
                other => other,
            })
    }

    pub(crate) async fn register(
        &self,
        email: &str,
        password: &str,
        name: Option<String>,
    ) -> Result<AuthResponse, ApiError> {
        let request = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name,
        };
        self.post("/api/auth/register", &request).await
    }

    pub(crate) async fn me(&self) -> Result<User, ApiError> {
        let response: MeResponse = self.get("/api/auth/me").await?;
        Ok(response.user)
    }

    pub(crate) async fn list_workspaces(&self) -> Result<Vec<WorkspaceSummary>, ApiError> {
        let response: WorkspacesResponse = self.get("/api/workspaces").await?;
        Ok(response.workspaces)
    }

    pub(crate) async fn create_workspace(&self, name: &str) -> Result<WorkspaceSummary, ApiError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::precondition("Workspace name is required"));
        }
        let request = CreateWorkspaceRequest {
            name: name.to_string(),
        };
        let response: WorkspaceResponse = self.post("/api/workspaces", &request).await?;
        Ok(response.workspace)
    }

    pub(crate) async fn delete_workspace(&self, workspace_id: &str) -> Result<(), ApiError> {
        let _: Value = self.delete(&workspace_path(workspace_id, "")).await?;
        Ok(())
    }

    pub(crate) async fn workspace_config(&self, workspace_id: &str) -> Result<Value, ApiError> {
        let response: ConfigDocument = self.get(&workspace_path(workspace_id, "config")).await?;
        Ok(response.config)
    }

    pub(crate) async fn save_workspace_config(
        &self,
        workspace_id: &str,
        config: &Value,
    ) -> Result<(), ApiError> {
        let _: Value = self
            .put(&workspace_path(workspace_id, "config"), &json!({ "config": config }))
            .await?;
        Ok(())
    }

    pub(crate) async fn start_session(&self, workspace_id: &str) -> Result<(), ApiError> {
        let _: Value = self
            .post(&workspace_path(workspace_id, "session/start"), &json!({}))
            .await?;
        Ok(())
    }

    pub(crate) async fn stop_session(&self, workspace_id: &str) -> Result<(), ApiError> {
        let _: Value = self
            .post(&workspace_path(workspace_id, "session/stop"), &json!({}))
            .await?;
        Ok(())
    }

    pub(crate) async fn report(&self, workspace_id: &str) -> Result<Vec<ReportDay>, ApiError> {
        let response: ReportResponse = self.get(&workspace_path(workspace_id, "reports")).await?;
        Ok(response.days)
    }

    /// Download link for the CSV export; the token rides in the query so the
    /// link works outside this client.
    pub(crate) fn reports_csv_url(&self, workspace_id: &str) -> Result<String, ApiError> {
        let raw = self.url(&workspace_path(workspace_id, "reports/csv"))?;
        let mut url = Url::parse(&raw)
            .map_err(|err| ApiError::precondition(format!("invalid report url {raw}: {err}")))?;
        if let Some(token) = self.token() {
            url.query_pairs_mut().append_pair("token", &token);
        }
        Ok(url.into())
    }

    pub(crate) async fn list_media(&self, workspace_id: &str) -> Result<Vec<MediaItem>, ApiError> {
        let response: MediaResponse = self.get(&workspace_path(workspace_id, "media")).await?;
        Ok(response.media)
    }

    pub(crate) async fn upload_media(
        &self,
        workspace_id: &str,
        file: &Path,
    ) -> Result<MediaItem, ApiError> {
        let form = file_form(file).await?;
        let response: MediaUploadResponse = self
            .post_multipart(&workspace_path(workspace_id, "media"), form)
            .await?;
        Ok(response.media)
    }

    pub(crate) async fn import_recipients(
        &self,
        workspace_id: &str,
        file: &Path,
    ) -> Result<ImportResponse, ApiError> {
        let form = file_form(file).await?;
        self.post_multipart(&workspace_path(workspace_id, "recipients/import"), form)
            .await
    }

    pub(crate) async fn list_schedules(
        &self,
        workspace_id: &str,
    ) -> Result<Vec<ScheduledSend>, ApiError> {
        let response: SchedulesResponse =
            self.get(&workspace_path(workspace_id, "schedules")).await?;
        Ok(response.schedules)
    }

    pub(crate) async fn cancel_schedule(
        &self,
        workspace_id: &str,
        schedule_id: &str,
    ) -> Result<(), ApiError> {
        let path = workspace_path(workspace_id, &format!("schedules/{}", segment(schedule_id)));
        let _: Value = self.delete(&path).await?;
        Ok(())
    }

    pub(crate) async fn post_campaign(
        &self,
        workspace_id: &str,
        request: &CampaignRequest,
    ) -> Result<CampaignSendResponse, ApiError> {
        let path = workspace_path(workspace_id, "campaigns/send");
        let url = self.url(&path)?;
        let builder = self
            .http()
            .post(&url)
            .header(IDEMPOTENCY_HEADER, Uuid::new_v4().to_string())
            .json(request);
        let value = self.execute(Method::POST, &path, builder).await?;
        decode_payload(value)
    }

    pub(crate) async fn list_templates(&self, workspace_id: &str) -> Result<Vec<Template>, ApiError> {
        let response: TemplatesResponse =
            self.get(&workspace_path(workspace_id, "templates")).await?;
        Ok(response.templates)
    }

    pub(crate) async fn save_template(
        &self,
        workspace_id: &str,
        name: &str,
        body: &str,
    ) -> Result<(), ApiError> {
        if name.trim().is_empty() || body.trim().is_empty() {
            return Err(ApiError::precondition("Template name and body are required"));
        }
        let request = SaveTemplateRequest {
            name: name.trim().to_string(),
            body: body.to_string(),
        };
        let _: Value = self
            .post(&workspace_path(workspace_id, "templates"), &request)
            .await?;
        Ok(())
    }

    pub(crate) async fn delete_template(
        &self,
        workspace_id: &str,
        template_id: &str,
    ) -> Result<(), ApiError> {
        let path = workspace_path(workspace_id, &format!("templates/{}", segment(template_id)));
        let _: Value = self.delete(&path).await?;
        Ok(())
    }

    pub(crate) async fn automation(&self, workspace_id: &str) -> Result<AutomationSettings, ApiError> {
        self.get(&workspace_path(workspace_id, "automation")).await
    }

    pub(crate) async fn set_automation(
        &self,
        workspace_id: &str,
        settings: &AutomationSettings,
    ) -> Result<AutomationSettings, ApiError> {
        self.put(&workspace_path(workspace_id, "automation"), settings)
            .await
    }

    pub(crate) async fn agent_config(&self, workspace_id: &str) -> Result<Value, ApiError> {
        let response: ConfigDocument = self.get(&workspace_path(workspace_id, "agent")).await?;
        Ok(response.config)
    }

    pub(crate) async fn save_agent_config(
        &self,
        workspace_id: &str,
        config: &Value,
    ) -> Result<(), ApiError> {
        let _: Value = self
            .put(&workspace_path(workspace_id, "agent"), &json!({ "config": config }))
            .await?;
        Ok(())
    }

    pub(crate) async fn alerts(&self, workspace_id: &str) -> Result<Vec<Alert>, ApiError> {
        let response: AlertsResponse = self.get(&workspace_path(workspace_id, "alerts")).await?;
        Ok(response.alerts)
    }

    pub(crate) async fn billing(&self, workspace_id: &str) -> Result<BillingInfo, ApiError> {
        let response: BillingResponse = self.get(&workspace_path(workspace_id, "billing")).await?;
        Ok(response.billing)
    }

    pub(crate) async fn leads(&self, workspace_id: &str) -> Result<Vec<Lead>, ApiError> {
        let response: LeadsResponse = self.get(&workspace_path(workspace_id, "leads")).await?;
        Ok(response.leads)
    }

    pub(crate) async fn fetch_chat(
        &self,
        workspace_id: &str,
        contact_id: &str,
    ) -> Result<ChatMessagesResponse, ApiError> {
        self.get(&chat_path(workspace_id, contact_id, "messages"))
            .await
    }

    pub(crate) async fn send_chat_message(
        &self,
        workspace_id: &str,
        contact_id: &str,
        body: &str,
    ) -> Result<(), ApiError> {
        if body.trim().is_empty() {
            return Err(ApiError::precondition("Message is empty"));
        }
        let request = SendChatMessage {
            body: body.to_string(),
        };
        let _: Value = self
            .post(&chat_path(workspace_id, contact_id, "messages"), &request)
            .await?;
        Ok(())
    }

    pub(crate) async fn set_takeover(
        &self,
        workspace_id: &str,
        contact_id: &str,
        enabled: bool,
    ) -> Result<(), ApiError> {
        let _: Value = self
            .post(
                &chat_path(workspace_id, contact_id, "takeover"),
                &TakeoverRequest { enabled },
            )
            .await?;
        Ok(())
    }

    pub(crate) async fn admin_workspaces(&self) -> Result<Vec<WorkspaceSummary>, ApiError> {
        let response: WorkspacesResponse = self.get(ADMIN_WORKSPACES).await?;
        Ok(response.workspaces)
    }

    pub(crate) async fn admin_set_plan(&self, workspace_id: &str, plan: &str) -> Result<(), ApiError> {
        let path = format!("{ADMIN_WORKSPACES}/{}/plan", segment(workspace_id));
        let request = AdminPlanRequest {
            plan: plan.to_string(),
        };
        let _: Value = self.post(&path, &request).await?;
        Ok(())
    }

    pub(crate) async fn admin_suspend(
        &self,
        workspace_id: &str,
        suspended: bool,
    ) -> Result<(), ApiError> {
        let path = format!("{ADMIN_WORKSPACES}/{}/suspend", segment(workspace_id));
        let _: Value = self
            .post(&path, &AdminSuspendRequest { suspended })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionApi for ApiClient {
    async fn workspace_status(&self, workspace_id: &str) -> Result<SessionSnapshot, ApiError> {
        self.get(&workspace_path(workspace_id, "status")).await
    }

    async fn chat_messages(
        &self,
        workspace_id: &str,
        contact_id: &str,
    ) -> Result<ChatMessagesResponse, ApiError> {
        self.fetch_chat(workspace_id, contact_id).await
    }

    async fn send_campaign(
        &self,
        workspace_id: &str,
        request: &CampaignRequest,
    ) -> Result<CampaignSendResponse, ApiError> {
        self.post_campaign(workspace_id, request).await
    }

    fn forget_credentials(&self) {
        self.set_token(None);
    }
}

fn chat_path(workspace_id: &str, contact_id: &str, rest: &str) -> String {
    workspace_path(workspace_id, &format!("chats/{}/{rest}", segment(contact_id)))
}

async fn file_form(file: &Path) -> Result<Form, ApiError> {
    let bytes = tokio::fs::read(file).await?;
    let file_name = file
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(Form::new().part("file", Part::bytes(bytes).file_name(file_name)))
}
