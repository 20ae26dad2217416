use chrono::{DateTime, Utc};
use protocol::{CampaignOutcome, CampaignRequest, CampaignSendResponse};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::events::{DashboardEvent, ToastLevel};
use crate::state::WorkspaceContext;

use super::progress::ProgressSink;
use super::RuntimeContext;

const EMPTY_CAMPAIGN: &str = "Enter a message or attach media first";
const WORKSPACE_SENDING: &str = "A campaign is already sending for this workspace";
const CLIENT_SENDING: &str = "A campaign send is already in progress";

/// Campaign composed by the operator, before validation.
#[derive(Clone, Debug, Default)]
pub(crate) struct CampaignDraft {
    pub(crate) messages: Vec<String>,
    pub(crate) media_id: Option<String>,
    pub(crate) template_id: Option<String>,
    pub(crate) send_at: Option<String>,
}

impl CampaignDraft {
    /// Rejects a draft with neither a message nor media.
    pub(crate) fn validate(&self) -> Result<(), ApiError> {
        let has_message = self.messages.iter().any(|message| !message.trim().is_empty());
        let has_media = self
            .media_id
            .as_deref()
            .is_some_and(|media| !media.trim().is_empty());
        if has_message || has_media {
            Ok(())
        } else {
            Err(ApiError::precondition(EMPTY_CAMPAIGN))
        }
    }

    fn into_request(self) -> Result<CampaignRequest, ApiError> {
        let messages: Vec<String> = self
            .messages
            .into_iter()
            .filter(|message| !message.trim().is_empty())
            .collect();
        let media_id = non_blank(self.media_id);
        if messages.is_empty() && media_id.is_none() {
            return Err(ApiError::precondition(EMPTY_CAMPAIGN));
        }
        Ok(CampaignRequest {
            messages,
            media_id,
            template_id: non_blank(self.template_id),
            send_at: non_blank(self.send_at),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum CampaignReport {
    Scheduled { send_at: String },
    Sent { total: usize },
}

/// Dispatches a campaign for the active workspace.
///
/// Refused without a request when the draft is empty, when the workspace
/// reports a send in progress, or while this client has one outstanding.
pub(crate) async fn send_campaign(
    ctx: &RuntimeContext,
    draft: CampaignDraft,
) -> Result<CampaignReport, ApiError> {
    let request = match draft.into_request() {
        Ok(request) => request,
        Err(err) => {
            ctx.toast(ToastLevel::Error, err.to_string());
            return Err(err);
        }
    };
    let (workspace, workspace_sending) = {
        let state = ctx.state.read().await;
        (state.workspace(), state.workspace_send_in_progress())
    };
    let Some(workspace) = workspace else {
        return Err(ApiError::precondition("Select a workspace first"));
    };
    if workspace_sending {
        return Err(refuse(ctx, &workspace, WORKSPACE_SENDING).await);
    }
    let Some(guard) = ctx.guards.campaign.try_acquire() else {
        return Err(refuse(ctx, &workspace, CLIENT_SENDING).await);
    };

    ctx.emit(DashboardEvent::SendControl { enabled: false });
    let result = dispatch(ctx, &workspace, &request).await;
    drop(guard);
    ctx.sync_send_control().await;
    result
}

async fn refuse(ctx: &RuntimeContext, workspace: &WorkspaceContext, reason: &str) -> ApiError {
    info!(event = "campaign.refused", workspace = %workspace.id, reason = %reason);
    ctx.log(reason).await;
    ctx.toast(ToastLevel::Info, reason);
    ApiError::precondition(reason)
}

async fn dispatch(
    ctx: &RuntimeContext,
    workspace: &WorkspaceContext,
    request: &CampaignRequest,
) -> Result<CampaignReport, ApiError> {
    info!(
        event = "campaign.send",
        workspace = %workspace.id,
        messages = request.messages.len(),
        media = request.media_id.is_some(),
        scheduled = request.send_at.is_some(),
        "sending campaign"
    );
    match ctx.api.send_campaign(&workspace.id, request).await {
        Ok(response) => Ok(report_success(ctx, workspace, response).await),
        Err(err) if err.is_unauthorized() => {
            ctx.logout("campaign send unauthorized").await;
            Err(err)
        }
        Err(err) => {
            warn!(
                event = "campaign.failed",
                workspace = %workspace.id,
                error = %err,
                "campaign send failed"
            );
            let message = format!("Campaign failed: {err}");
            ctx.log(&message).await;
            ctx.toast(ToastLevel::Error, message);
            ctx.notify("Campaign failed", err.to_string());
            Err(err)
        }
    }
}

async fn report_success(
    ctx: &RuntimeContext,
    workspace: &WorkspaceContext,
    response: CampaignSendResponse,
) -> CampaignReport {
    match response.outcome() {
        CampaignOutcome::Scheduled(scheduled) => {
            let send_at = format_send_at(&scheduled.send_at);
            info!(
                event = "campaign.scheduled",
                workspace = %workspace.id,
                send_at = %scheduled.send_at
            );
            let message = format!("Campaign scheduled for {send_at}");
            ctx.log(&message).await;
            ctx.toast(ToastLevel::Success, message.clone());
            ctx.notify("Campaign scheduled", message);
            CampaignReport::Scheduled { send_at }
        }
        CampaignOutcome::SentNow { results } => {
            ctx.progress
                .run(results, &ProgressSink::new(ctx.event_tx.clone()))
                .await;
            info!(event = "campaign.sent", workspace = %workspace.id, results = results);
            let message = format!("Campaign sent: {results} messages");
            ctx.log(&message).await;
            ctx.toast(ToastLevel::Success, message.clone());
            ctx.notify("Campaign sent", message);

            let hide = ctx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(hide.settings.progress_hide_delay).await;
                hide.emit(DashboardEvent::ProgressHidden);
            });
            CampaignReport::Sent { total: results }
        }
    }
}

/// Renders an RFC 3339 instant for display; unparsable input is shown as-is.
pub(crate) fn format_send_at(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|at| at.with_timezone(&Utc).format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{drain_events, test_context, FakeApi};
    use protocol::{ScheduledSend, SessionSnapshot, SessionStatus};
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn validate_needs_message_or_media() {
        let blank = CampaignDraft {
            messages: vec!["  ".to_string()],
            media_id: Some(" ".to_string()),
            ..CampaignDraft::default()
        };
        assert_eq!(
            blank.validate().unwrap_err().to_string(),
            "Enter a message or attach media first"
        );
        let media_only = CampaignDraft {
            media_id: Some("media-1".to_string()),
            ..CampaignDraft::default()
        };
        assert!(media_only.validate().is_ok());
    }

    async fn ready_context(
        api: Arc<FakeApi>,
    ) -> (RuntimeContext, tokio::sync::broadcast::Receiver<DashboardEvent>) {
        let (ctx, rx) = test_context(api);
        {
            let mut state = ctx.state.write().await;
            state.begin_session(None);
            let workspace = state.select_workspace("ws-1".to_string());
            state.apply_snapshot(
                &workspace,
                SessionSnapshot {
                    status: SessionStatus::Ready,
                    ready: true,
                    ..SessionSnapshot::default()
                },
                false,
            );
        }
        (ctx, rx)
    }

    fn draft(messages: &[&str]) -> CampaignDraft {
        CampaignDraft {
            messages: messages.iter().map(|m| m.to_string()).collect(),
            ..CampaignDraft::default()
        }
    }

    #[tokio::test]
    async fn blank_draft_is_rejected_before_request() {
        let api = FakeApi::new();
        let (ctx, _rx) = ready_context(api.clone()).await;
        let err = send_campaign(&ctx, draft(&["", "   "])).await.unwrap_err();
        assert_eq!(err.to_string(), EMPTY_CAMPAIGN);
        assert_eq!(api.campaign_calls.load(Ordering::SeqCst), 0);

        let media_only = CampaignDraft {
            media_id: Some("media-1".to_string()),
            ..CampaignDraft::default()
        };
        send_campaign(&ctx, media_only).await.expect("media only");
        assert_eq!(api.campaign_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn second_submission_while_in_flight_is_refused() {
        let api = FakeApi::new();
        api.set_campaign_delay(Duration::from_secs(2));
        let (ctx, mut rx) = ready_context(api.clone()).await;

        let (first, second) = tokio::join!(
            send_campaign(&ctx, draft(&["hello"])),
            send_campaign(&ctx, draft(&["hello again"]))
        );
        assert!(first.is_ok());
        assert_eq!(second.unwrap_err().to_string(), CLIENT_SENDING);
        assert_eq!(api.campaign_calls.load(Ordering::SeqCst), 1);
        assert!(!ctx.guards.campaign.is_held());

        let events = drain_events(&mut rx);
        assert!(events.iter().any(|event| matches!(
            event,
            DashboardEvent::LogAppended { line } if line.ends_with(CLIENT_SENDING)
        )));
        assert!(matches!(
            events
                .iter()
                .filter(|event| matches!(event, DashboardEvent::SendControl { .. }))
                .last(),
            Some(DashboardEvent::SendControl { enabled: true })
        ));
    }

    #[tokio::test]
    async fn workspace_send_in_progress_blocks_dispatch() {
        let api = FakeApi::new();
        let (ctx, _rx) = test_context(api.clone());
        {
            let mut state = ctx.state.write().await;
            state.begin_session(None);
            let workspace = state.select_workspace("ws-1".to_string());
            state.apply_snapshot(
                &workspace,
                SessionSnapshot {
                    status: SessionStatus::Ready,
                    ready: true,
                    send_in_progress: true,
                    ..SessionSnapshot::default()
                },
                false,
            );
        }
        let err = send_campaign(&ctx, draft(&["hi"])).await.unwrap_err();
        assert_eq!(err.to_string(), WORKSPACE_SENDING);
        assert_eq!(api.campaign_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_response_skips_progress() {
        let api = FakeApi::new();
        api.reply_campaign(|| {
            Ok(CampaignSendResponse {
                scheduled: Some(ScheduledSend {
                    send_at: "2024-01-01T10:00:00Z".to_string(),
                    ..ScheduledSend::default()
                }),
                results: Vec::new(),
            })
        });
        let (ctx, mut rx) = ready_context(api).await;

        let report = send_campaign(&ctx, draft(&["hi"])).await.expect("send");
        assert_eq!(
            report,
            CampaignReport::Scheduled {
                send_at: "2024-01-01 10:00 UTC".to_string()
            }
        );
        tokio::time::sleep(Duration::from_secs(5)).await;

        let events = drain_events(&mut rx);
        assert!(events.iter().any(|event| matches!(
            event,
            DashboardEvent::LogAppended { line } if line.contains("2024-01-01 10:00 UTC")
        )));
        assert!(events.iter().any(|event| matches!(
            event,
            DashboardEvent::Toast { message, .. } if message.contains("2024-01-01 10:00 UTC")
        )));
        assert!(events
            .iter()
            .any(|event| matches!(event, DashboardEvent::Notification { .. })));
        assert!(!events.iter().any(|event| matches!(
            event,
            DashboardEvent::Progress { .. } | DashboardEvent::ProgressHidden
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_send_animates_then_hides_progress() {
        let api = FakeApi::new();
        api.reply_campaign(|| {
            Ok(CampaignSendResponse {
                scheduled: None,
                results: vec![json!({}), json!({}), json!({})],
            })
        });
        let (ctx, mut rx) = ready_context(api).await;

        let report = send_campaign(&ctx, draft(&["one", "two"])).await.expect("send");
        assert_eq!(report, CampaignReport::Sent { total: 3 });

        let steps: Vec<(usize, usize)> = drain_events(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                DashboardEvent::Progress { done, total } => Some((done, total)),
                _ => None,
            })
            .collect();
        assert_eq!(steps, vec![(0, 3), (1, 3), (2, 3), (3, 3)]);

        tokio::time::sleep(Duration::from_millis(1_400)).await;
        assert!(!drain_events(&mut rx)
            .iter()
            .any(|event| matches!(event, DashboardEvent::ProgressHidden)));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(drain_events(&mut rx)
            .iter()
            .any(|event| matches!(event, DashboardEvent::ProgressHidden)));
    }

    #[tokio::test]
    async fn failure_reports_and_reenables_send() {
        let api = FakeApi::new();
        api.reply_campaign(|| {
            Err(ApiError::Server {
                status: 500,
                message: "Request failed: 500".to_string(),
            })
        });
        let (ctx, mut rx) = ready_context(api).await;

        assert!(send_campaign(&ctx, draft(&["hi"])).await.is_err());
        assert!(!ctx.guards.campaign.is_held());
        let events = drain_events(&mut rx);
        assert!(events.iter().any(|event| matches!(
            event,
            DashboardEvent::Toast { level: ToastLevel::Error, .. }
        )));
        assert!(events.iter().any(|event| matches!(
            event,
            DashboardEvent::Notification { title, .. } if title == "Campaign failed"
        )));
        assert!(matches!(
            events.last(),
            Some(DashboardEvent::SendControl { enabled: true })
        ));
    }

    #[test]
    fn send_at_formatting_falls_back_to_raw() {
        assert_eq!(format_send_at("2024-01-01T12:00:00+02:00"), "2024-01-01 10:00 UTC");
        assert_eq!(format_send_at("tomorrow"), "tomorrow");
    }
}
