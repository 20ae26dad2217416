use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::events::DashboardEvent;
use crate::state::WorkspaceContext;

use super::RuntimeContext;

struct LiveChatSession {
    contact_id: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl LiveChatSession {
    fn stop(self) -> String {
        self.cancel.cancel();
        self.handle.abort();
        self.contact_id
    }
}

/// At most one contact's transcript is polled at a time.
#[derive(Default)]
pub(crate) struct LiveChatPoller {
    active: Mutex<Option<LiveChatSession>>,
}

impl LiveChatPoller {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Starts polling `contact_id`, stopping any session already running.
    ///
    /// The poll is scoped to `workspace`, so switching workspace ends it too.
    pub(crate) fn open(&self, ctx: &RuntimeContext, workspace: &WorkspaceContext, contact_id: &str) {
        let mut active = self.lock();
        if let Some(previous) = active.take() {
            let contact_id = previous.stop();
            ctx.emit(DashboardEvent::LiveChatClosed { contact_id });
        }
        let cancel = workspace.cancel.child_token();
        let handle = tokio::spawn(run_live_chat(
            ctx.clone(),
            workspace.clone(),
            contact_id.to_string(),
            cancel.clone(),
        ));
        info!(
            event = "live_chat.opened",
            workspace = %workspace.id,
            contact = %contact_id,
            "live chat poll started"
        );
        *active = Some(LiveChatSession {
            contact_id: contact_id.to_string(),
            cancel,
            handle,
        });
    }

    pub(crate) fn close(&self, ctx: &RuntimeContext) -> Option<String> {
        let session = self.lock().take()?;
        let contact_id = session.stop();
        info!(event = "live_chat.closed", contact = %contact_id, "live chat poll stopped");
        ctx.emit(DashboardEvent::LiveChatClosed {
            contact_id: contact_id.clone(),
        });
        Some(contact_id)
    }

    pub(crate) fn active_contact(&self) -> Option<String> {
        self.lock()
            .as_ref()
            .filter(|session| !session.cancel.is_cancelled())
            .map(|session| session.contact_id.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Option<LiveChatSession>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn run_live_chat(
    ctx: RuntimeContext,
    workspace: WorkspaceContext,
    contact_id: String,
    cancel: CancellationToken,
) {
    let mut ticker = interval(ctx.settings.chat_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = ctx.api.chat_messages(&workspace.id, &contact_id) => result,
        };
        match result {
            Ok(chat) => {
                if cancel.is_cancelled() {
                    break;
                }
                ctx.emit(DashboardEvent::ChatMessages {
                    contact_id: contact_id.clone(),
                    messages: chat.messages,
                    takeover: chat.takeover,
                });
            }
            Err(err) if err.is_unauthorized() => {
                ctx.logout("live chat unauthorized").await;
                break;
            }
            Err(err) => {
                warn!(
                    event = "live_chat.fetch_failed",
                    workspace = %workspace.id,
                    contact = %contact_id,
                    error = %err,
                    "live chat refresh failed"
                );
                ctx.log(&format!("Chat refresh failed: {err}")).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{drain_events, test_context, FakeApi};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn switching_contact_stops_previous_poll() {
        let api = FakeApi::new();
        let (ctx, mut rx) = test_context(api.clone());
        ctx.state.write().await.begin_session(None);
        let workspace = ctx.state.write().await.select_workspace("ws-1".to_string());
        let poller = LiveChatPoller::new();

        poller.open(&ctx, &workspace, "contact-a");
        tokio::time::sleep(Duration::from_millis(3_100)).await;
        assert_eq!(api.chat_calls_for("contact-a"), 2);

        poller.open(&ctx, &workspace, "contact-b");
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.chat_calls_for("contact-a"), 2);
        assert_eq!(api.chat_calls_for("contact-b"), 4);
        assert_eq!(poller.active_contact().as_deref(), Some("contact-b"));

        let events = drain_events(&mut rx);
        assert!(events.iter().any(|event| matches!(
            event,
            DashboardEvent::LiveChatClosed { contact_id } if contact_id == "contact-a"
        )));
        assert!(events.iter().any(|event| matches!(
            event,
            DashboardEvent::ChatMessages { contact_id, .. } if contact_id == "contact-b"
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn close_and_workspace_switch_end_polling() {
        let api = FakeApi::new();
        let (ctx, _rx) = test_context(api.clone());
        ctx.state.write().await.begin_session(None);
        let workspace = ctx.state.write().await.select_workspace("ws-1".to_string());
        let poller = LiveChatPoller::new();

        poller.open(&ctx, &workspace, "contact-a");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(poller.close(&ctx).as_deref(), Some("contact-a"));
        assert_eq!(poller.close(&ctx), None);
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(api.chat_calls_for("contact-a"), 1);

        poller.open(&ctx, &workspace, "contact-c");
        tokio::time::sleep(Duration::from_millis(100)).await;
        ctx.state.write().await.select_workspace("ws-2".to_string());
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(api.chat_calls_for("contact-c"), 1);
        assert_eq!(poller.active_contact(), None);
    }
}
