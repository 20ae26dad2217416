//! Records behind the dashboard's tables and cards.
//!
//! Everything the client only displays is `#[serde(default)]` so a backend
//! that omits a column degrades to an empty cell instead of a decode error.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkspaceSummary {
    pub id: String,
    pub name: String,
    pub plan: Option<String>,
    pub owner_email: Option<String>,
    pub suspended: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct WorkspacesResponse {
    pub workspaces: Vec<WorkspaceSummary>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WorkspaceResponse {
    pub workspace: WorkspaceSummary,
}

#[derive(Clone, Debug, Serialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub name: Option<String>,
    pub phone: String,
    pub status: Option<String>,
    pub tags: Vec<String>,
    pub unread: u32,
    pub last_message_at: Option<String>,
    pub takeover: bool,
}

impl Lead {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.phone)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct LeadsResponse {
    pub leads: Vec<Lead>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub body: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TemplatesResponse {
    pub templates: Vec<Template>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SaveTemplateRequest {
    pub name: String,
    pub body: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    #[default]
    Info,
    Warning,
    Error,
}

impl AlertLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Error => "error",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Alert {
    pub id: String,
    pub level: AlertLevel,
    pub message: String,
    pub at: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AlertsResponse {
    pub alerts: Vec<Alert>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BillingInfo {
    pub plan: String,
    pub status: Option<String>,
    pub renews_at: Option<String>,
    pub messages_used: u64,
    pub messages_limit: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BillingResponse {
    pub billing: BillingInfo,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportTotals {
    pub sent: u64,
    pub delivered: u64,
    pub failed: u64,
    pub replies: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportDay {
    pub day: String,
    pub sent: u64,
    pub delivered: u64,
    pub failed: u64,
    pub replies: u64,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReportResponse {
    pub days: Vec<ReportDay>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct MediaResponse {
    pub media: Vec<MediaItem>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MediaUploadResponse {
    pub media: MediaItem,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImportResponse {
    pub imported: u64,
    pub skipped: u64,
}

/// Named on/off switches for the workspace's automated flows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationSettings {
    pub toggles: BTreeMap<String, bool>,
}

#[derive(Clone, Debug, Serialize)]
pub struct AdminPlanRequest {
    pub plan: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct AdminSuspendRequest {
    pub suspended: bool,
}

/// Free-form documents (workspace config, agent config) the client edits
/// without interpreting.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfigDocument {
    pub config: Value,
}
