use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use protocol::{CampaignRequest, CampaignSendResponse, ChatMessagesResponse, SessionSnapshot};
use tokio::sync::{broadcast, RwLock};

use crate::api::SessionApi;
use crate::config::RuntimeSettings;
use crate::credentials::CredentialStore;
use crate::error::ApiError;
use crate::events::DashboardEvent;
use crate::runtime::{Guards, RuntimeContext, SimulatedProgress};
use crate::state::DashboardState;

static TEMP_SEQ: AtomicUsize = AtomicUsize::new(0);

pub(crate) fn temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    dir.push(format!("{prefix}-{nanos}-{seq}"));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub(crate) fn drain_events(rx: &mut broadcast::Receiver<DashboardEvent>) -> Vec<DashboardEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Runtime wired to `api` with default timings and a throwaway state dir.
pub(crate) fn test_context(
    api: Arc<FakeApi>,
) -> (RuntimeContext, broadcast::Receiver<DashboardEvent>) {
    let (event_tx, rx) = broadcast::channel(512);
    let settings = RuntimeSettings::default();
    let ctx = RuntimeContext {
        api,
        state: Arc::new(RwLock::new(DashboardState::new(settings.log_max_chars))),
        event_tx,
        guards: Arc::new(Guards::default()),
        credentials: CredentialStore::new(&temp_dir("crm-dashboard-test")),
        progress: Arc::new(SimulatedProgress::new(settings.progress_step)),
        settings,
    };
    (ctx, rx)
}

pub(crate) type Scripted<T> = Arc<dyn Fn() -> Result<T, ApiError> + Send + Sync>;

/// Scriptable stand-in for the backend that records every call it receives.
pub(crate) struct FakeApi {
    pub(crate) status_calls: AtomicUsize,
    pub(crate) status_in_flight: AtomicUsize,
    pub(crate) status_max_in_flight: AtomicUsize,
    pub(crate) status_delay: Mutex<Duration>,
    pub(crate) status_reply: Mutex<Scripted<SessionSnapshot>>,
    pub(crate) campaign_calls: AtomicUsize,
    pub(crate) campaign_delay: Mutex<Duration>,
    pub(crate) campaign_reply: Mutex<Scripted<CampaignSendResponse>>,
    pub(crate) chat_calls: Mutex<HashMap<String, usize>>,
    pub(crate) forgotten: AtomicUsize,
}

impl FakeApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            status_calls: AtomicUsize::new(0),
            status_in_flight: AtomicUsize::new(0),
            status_max_in_flight: AtomicUsize::new(0),
            status_delay: Mutex::new(Duration::ZERO),
            status_reply: Mutex::new(Arc::new(|| Ok(SessionSnapshot::default()))),
            campaign_calls: AtomicUsize::new(0),
            campaign_delay: Mutex::new(Duration::ZERO),
            campaign_reply: Mutex::new(Arc::new(|| Ok(CampaignSendResponse::default()))),
            chat_calls: Mutex::new(HashMap::new()),
            forgotten: AtomicUsize::new(0),
        })
    }

    pub(crate) fn reply_status(
        &self,
        reply: impl Fn() -> Result<SessionSnapshot, ApiError> + Send + Sync + 'static,
    ) {
        *self.status_reply.lock().unwrap() = Arc::new(reply);
    }

    pub(crate) fn reply_campaign(
        &self,
        reply: impl Fn() -> Result<CampaignSendResponse, ApiError> + Send + Sync + 'static,
    ) {
        *self.campaign_reply.lock().unwrap() = Arc::new(reply);
    }

    pub(crate) fn set_status_delay(&self, delay: Duration) {
        *self.status_delay.lock().unwrap() = delay;
    }

    pub(crate) fn set_campaign_delay(&self, delay: Duration) {
        *self.campaign_delay.lock().unwrap() = delay;
    }

    pub(crate) fn chat_calls_for(&self, contact_id: &str) -> usize {
        self.chat_calls
            .lock()
            .unwrap()
            .get(contact_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl SessionApi for FakeApi {
    async fn workspace_status(&self, _workspace_id: &str) -> Result<SessionSnapshot, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.status_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.status_max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.status_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.status_in_flight.fetch_sub(1, Ordering::SeqCst);
        let reply = self.status_reply.lock().unwrap().clone();
        reply()
    }

    async fn chat_messages(
        &self,
        _workspace_id: &str,
        contact_id: &str,
    ) -> Result<ChatMessagesResponse, ApiError> {
        *self
            .chat_calls
            .lock()
            .unwrap()
            .entry(contact_id.to_string())
            .or_default() += 1;
        Ok(ChatMessagesResponse::default())
    }

    async fn send_campaign(
        &self,
        _workspace_id: &str,
        _request: &CampaignRequest,
    ) -> Result<CampaignSendResponse, ApiError> {
        self.campaign_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.campaign_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let reply = self.campaign_reply.lock().unwrap().clone();
        reply()
    }

    fn forget_credentials(&self) {
        self.forgotten.fetch_add(1, Ordering::SeqCst);
    }
}
