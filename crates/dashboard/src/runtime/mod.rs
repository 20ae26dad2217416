mod campaign;
mod guard;
mod live_chat;
mod poller;
mod progress;
mod status;

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::api::SessionApi;
use crate::config::RuntimeSettings;
use crate::credentials::CredentialStore;
use crate::events::{DashboardEvent, ToastLevel};
use crate::state::DashboardState;

pub(crate) use campaign::{format_send_at, send_campaign, CampaignDraft, CampaignReport};
pub(crate) use guard::InFlight;
pub(crate) use live_chat::LiveChatPoller;
pub(crate) use poller::{spawn_elapsed_ticker, spawn_status_poller};
pub(crate) use progress::{ProgressEstimator, SimulatedProgress};
pub(crate) use status::{refresh_status, RefreshOutcome};

/// Client-owned in-flight flags, one per guarded request kind.
#[derive(Debug, Default)]
pub(crate) struct Guards {
    pub(crate) status: InFlight,
    pub(crate) campaign: InFlight,
}

/// Handles every runtime task needs; cheap to clone into spawned tasks.
#[derive(Clone)]
pub(crate) struct RuntimeContext {
    pub(crate) api: Arc<dyn SessionApi>,
    pub(crate) state: Arc<RwLock<DashboardState>>,
    pub(crate) event_tx: broadcast::Sender<DashboardEvent>,
    pub(crate) guards: Arc<Guards>,
    pub(crate) credentials: CredentialStore,
    pub(crate) settings: RuntimeSettings,
    pub(crate) progress: Arc<dyn ProgressEstimator>,
}

impl RuntimeContext {
    pub(crate) fn emit(&self, event: DashboardEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Appends a timestamped line to the operator-visible event log.
    pub(crate) async fn log(&self, message: &str) {
        let line = {
            let mut state = self.state.write().await;
            state.append_log(message)
        };
        self.emit(DashboardEvent::LogAppended { line });
    }

    pub(crate) fn toast(&self, level: ToastLevel, message: impl Into<String>) {
        self.emit(DashboardEvent::Toast {
            level,
            message: message.into(),
        });
    }

    pub(crate) fn notify(&self, title: &str, body: impl Into<String>) {
        self.emit(DashboardEvent::Notification {
            title: title.to_string(),
            body: body.into(),
        });
    }

    pub(crate) async fn sync_send_control(&self) {
        let enabled = {
            let state = self.state.read().await;
            state.send_enabled(self.guards.campaign.is_held())
        };
        self.emit(DashboardEvent::SendControl { enabled });
    }

    /// Drops the stored token and leaves the authenticated view.
    ///
    /// Cancelling the session token stops every poller and aborts requests
    /// still in flight for the active workspace.
    pub(crate) async fn logout(&self, reason: &str) {
        if let Err(err) = self.credentials.clear() {
            warn!(error = %err, path = %self.credentials.path().display(), "failed to clear credentials");
        }
        self.api.forget_credentials();
        let was_active = {
            let mut state = self.state.write().await;
            state.end_session()
        };
        if was_active {
            info!(event = "session.logout", reason = %reason, "left authenticated view");
            self.emit(DashboardEvent::LoggedOut);
        }
    }
}
