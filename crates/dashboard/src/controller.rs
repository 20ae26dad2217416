use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::SessionApi;
use crate::config::RuntimeSettings;
use crate::credentials::CredentialStore;
use crate::error::ApiError;
use crate::events::DashboardEvent;
use crate::runtime::{
    self, spawn_elapsed_ticker, spawn_status_poller, CampaignDraft, CampaignReport, Guards,
    LiveChatPoller, ProgressEstimator, RefreshOutcome, RuntimeContext, SimulatedProgress,
};
use crate::state::{DashboardState, WorkspaceContext};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// One dashboard instance: state, in-flight guards and timers in one place.
pub(crate) struct DashboardController {
    ctx: RuntimeContext,
    live_chat: LiveChatPoller,
    pollers: Mutex<Vec<JoinHandle<()>>>,
}

impl DashboardController {
    pub(crate) fn new(
        api: Arc<dyn SessionApi>,
        credentials: CredentialStore,
        settings: RuntimeSettings,
    ) -> Self {
        let progress: Arc<dyn ProgressEstimator> =
            Arc::new(SimulatedProgress::new(settings.progress_step));
        Self::with_progress(api, credentials, settings, progress)
    }

    pub(crate) fn with_progress(
        api: Arc<dyn SessionApi>,
        credentials: CredentialStore,
        settings: RuntimeSettings,
        progress: Arc<dyn ProgressEstimator>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let ctx = RuntimeContext {
            api,
            state: Arc::new(RwLock::new(DashboardState::new(settings.log_max_chars))),
            event_tx,
            guards: Arc::new(Guards::default()),
            credentials,
            settings,
            progress,
        };
        Self {
            ctx,
            live_chat: LiveChatPoller::new(),
            pollers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.ctx.event_tx.subscribe()
    }

    pub(crate) async fn sign_in(&self, email: Option<String>) {
        self.stop_polling();
        let mut state = self.ctx.state.write().await;
        state.begin_session(email);
    }

    pub(crate) async fn is_authenticated(&self) -> bool {
        self.ctx.state.read().await.is_authenticated()
    }

    /// Makes `workspace_id` active; work still running for the previous one
    /// is cancelled and its results discarded.
    pub(crate) async fn select_workspace(&self, workspace_id: &str) -> WorkspaceContext {
        self.live_chat.close(&self.ctx);
        let context = {
            let mut state = self.ctx.state.write().await;
            state.select_workspace(workspace_id.to_string())
        };
        info!(
            event = "workspace.selected",
            workspace = %workspace_id,
            generation = context.generation,
            "workspace selected"
        );
        self.ctx.emit(DashboardEvent::WorkspaceSelected {
            workspace_id: workspace_id.to_string(),
        });
        self.ctx.sync_send_control().await;
        context
    }

    pub(crate) async fn refresh_status(&self) -> Result<RefreshOutcome, ApiError> {
        runtime::refresh_status(&self.ctx).await
    }

    /// Starts the status poller and connect timer for the signed-in session.
    pub(crate) async fn start_polling(&self) -> Result<(), ApiError> {
        let Some(session) = self.ctx.state.read().await.session_token() else {
            return Err(ApiError::precondition("Log in first"));
        };
        self.stop_polling();
        let status = spawn_status_poller(self.ctx.clone(), session.clone());
        let elapsed = spawn_elapsed_ticker(self.ctx.clone(), session);
        self.pollers_lock().extend([status, elapsed]);
        Ok(())
    }

    pub(crate) fn stop_polling(&self) {
        for handle in self.pollers_lock().drain(..) {
            handle.abort();
        }
    }

    pub(crate) async fn open_live_chat(&self, contact_id: &str) -> Result<(), ApiError> {
        let contact_id = contact_id.trim();
        if contact_id.is_empty() {
            return Err(ApiError::precondition("Pick a contact first"));
        }
        let Some(workspace) = self.ctx.state.read().await.workspace() else {
            return Err(ApiError::precondition("Select a workspace first"));
        };
        self.live_chat.open(&self.ctx, &workspace, contact_id);
        Ok(())
    }

    pub(crate) fn close_live_chat(&self) -> Option<String> {
        self.live_chat.close(&self.ctx)
    }

    pub(crate) fn live_chat_contact(&self) -> Option<String> {
        self.live_chat.active_contact()
    }

    pub(crate) async fn send_campaign(&self, draft: CampaignDraft) -> Result<CampaignReport, ApiError> {
        runtime::send_campaign(&self.ctx, draft).await
    }

    /// Routes a result from any other endpoint through the expired-session
    /// handling, so a 401 anywhere logs out.
    pub(crate) async fn check<T>(&self, result: Result<T, ApiError>) -> Result<T, ApiError> {
        if let Err(err) = &result {
            if err.is_unauthorized() {
                self.logout_with_reason("request unauthorized").await;
            }
        }
        result
    }

    pub(crate) async fn logout(&self) {
        self.logout_with_reason("user logout").await;
    }

    async fn logout_with_reason(&self, reason: &str) {
        self.live_chat.close(&self.ctx);
        self.stop_polling();
        self.ctx.logout(reason).await;
    }

    pub(crate) async fn session_email(&self) -> Option<String> {
        self.ctx.state.read().await.session_email().map(str::to_string)
    }

    pub(crate) async fn event_log(&self) -> String {
        self.ctx.state.read().await.event_log().as_str().to_string()
    }

    fn pollers_lock(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pollers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DashboardController {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
