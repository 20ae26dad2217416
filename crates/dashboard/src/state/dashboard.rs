use std::collections::HashMap;

use protocol::SessionSnapshot;
use tokio_util::sync::CancellationToken;

use super::event_log::EventLog;
use super::model::{can_send, elapsed_text, StatusView, WorkspaceContext};

struct SessionInfo {
    email: Option<String>,
    cancel: CancellationToken,
}

struct ConnectionState {
    snapshot: Option<SessionSnapshot>,
    elapsed_secs: u64,
    connect_active: bool,
    last_error: HashMap<String, String>,
}

/// Result of reconciling a snapshot into the active workspace.
pub(crate) struct AppliedSnapshot {
    pub(crate) view: StatusView,
    /// Error text that has not been reported for this workspace yet.
    pub(crate) new_error: Option<String>,
}

/// Everything one dashboard instance knows; owned by a single controller.
pub(crate) struct DashboardState {
    session: Option<SessionInfo>,
    workspace: Option<WorkspaceContext>,
    generation: u64,
    connection: ConnectionState,
    event_log: EventLog,
}

impl DashboardState {
    pub(crate) fn new(log_max_chars: usize) -> Self {
        Self {
            session: None,
            workspace: None,
            generation: 0,
            connection: ConnectionState {
                snapshot: None,
                elapsed_secs: 0,
                connect_active: false,
                last_error: HashMap::new(),
            },
            event_log: EventLog::new(log_max_chars),
        }
    }

    /// Enters the authenticated view; returns the token that scopes its timers.
    pub(crate) fn begin_session(&mut self, email: Option<String>) -> CancellationToken {
        if let Some(previous) = self.session.take() {
            previous.cancel.cancel();
        }
        let cancel = CancellationToken::new();
        self.session = Some(SessionInfo {
            email,
            cancel: cancel.clone(),
        });
        cancel
    }

    /// Leaves the authenticated view. Returns whether a session was active.
    pub(crate) fn end_session(&mut self) -> bool {
        self.clear_workspace();
        self.connection.last_error.clear();
        match self.session.take() {
            Some(session) => {
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub(crate) fn session_email(&self) -> Option<&str> {
        self.session.as_ref().and_then(|session| session.email.as_deref())
    }

    pub(crate) fn session_token(&self) -> Option<CancellationToken> {
        self.session.as_ref().map(|session| session.cancel.clone())
    }

    pub(crate) fn select_workspace(&mut self, id: String) -> WorkspaceContext {
        self.clear_workspace();
        self.generation += 1;
        let cancel = match &self.session {
            Some(session) => session.cancel.child_token(),
            None => CancellationToken::new(),
        };
        let context = WorkspaceContext {
            id,
            generation: self.generation,
            cancel,
        };
        self.workspace = Some(context.clone());
        context
    }

    pub(crate) fn clear_workspace(&mut self) {
        if let Some(previous) = self.workspace.take() {
            previous.cancel.cancel();
        }
        self.connection.snapshot = None;
        self.connection.elapsed_secs = 0;
        self.connection.connect_active = false;
    }

    pub(crate) fn workspace(&self) -> Option<WorkspaceContext> {
        self.workspace.clone()
    }

    pub(crate) fn is_current(&self, context: &WorkspaceContext) -> bool {
        !context.cancel.is_cancelled()
            && self
                .workspace
                .as_ref()
                .map(|active| active.generation == context.generation)
                .unwrap_or(false)
    }

    pub(crate) fn apply_snapshot(
        &mut self,
        context: &WorkspaceContext,
        snapshot: SessionSnapshot,
        client_send_in_flight: bool,
    ) -> Option<AppliedSnapshot> {
        if !self.is_current(context) {
            return None;
        }
        self.connection.elapsed_secs = snapshot.connect_elapsed_sec;
        self.connection.connect_active = !snapshot.ready && snapshot.status.is_connecting();
        let new_error = self.note_last_error(&context.id, snapshot.last_error());
        let view = StatusView::from_snapshot(
            &context.id,
            &snapshot,
            self.connection.elapsed_secs,
            client_send_in_flight,
        );
        self.connection.snapshot = Some(snapshot);
        Some(AppliedSnapshot { view, new_error })
    }

    /// Records the error currently reported for `workspace_id` and returns it
    /// only when it differs from the last one seen there.
    pub(crate) fn note_last_error(
        &mut self,
        workspace_id: &str,
        error: Option<&str>,
    ) -> Option<String> {
        let Some(error) = error else {
            self.connection.last_error.remove(workspace_id);
            return None;
        };
        if self.connection.last_error.get(workspace_id).map(String::as_str) == Some(error) {
            return None;
        }
        self.connection
            .last_error
            .insert(workspace_id.to_string(), error.to_string());
        Some(error.to_string())
    }

    /// Advances the cosmetic connect timer while a connection attempt is running.
    pub(crate) fn tick_elapsed(&mut self) -> Option<String> {
        if !self.connection.connect_active {
            return None;
        }
        self.connection.elapsed_secs += 1;
        Some(elapsed_text(self.connection.elapsed_secs))
    }

    #[cfg(test)]
    pub(crate) fn elapsed_secs(&self) -> u64 {
        self.connection.elapsed_secs
    }

    #[cfg(test)]
    pub(crate) fn connect_active(&self) -> bool {
        self.connection.connect_active
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> Option<&SessionSnapshot> {
        self.connection.snapshot.as_ref()
    }

    pub(crate) fn workspace_send_in_progress(&self) -> bool {
        self.connection
            .snapshot
            .as_ref()
            .map(|snapshot| snapshot.send_in_progress)
            .unwrap_or(false)
    }

    pub(crate) fn send_enabled(&self, client_send_in_flight: bool) -> bool {
        let ready = self
            .connection
            .snapshot
            .as_ref()
            .map(|snapshot| snapshot.ready)
            .unwrap_or(false);
        can_send(ready, self.workspace_send_in_progress(), client_send_in_flight)
    }

    pub(crate) fn append_log(&mut self, message: &str) -> String {
        self.event_log.append(message)
    }

    pub(crate) fn event_log(&self) -> &EventLog {
        &self.event_log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::SessionStatus;

    fn snapshot_with_error(error: Option<&str>) -> SessionSnapshot {
        SessionSnapshot {
            status: SessionStatus::Error,
            last_error: error.map(str::to_string),
            ..SessionSnapshot::default()
        }
    }

    #[test]
    fn repeated_error_is_reported_once_per_workspace() {
        let mut state = DashboardState::new(9_000);
        state.begin_session(None);
        let ctx = state.select_workspace("ws-1".to_string());

        let first = state
            .apply_snapshot(&ctx, snapshot_with_error(Some("auth failure")), false)
            .expect("applied");
        assert_eq!(first.new_error.as_deref(), Some("auth failure"));

        let second = state
            .apply_snapshot(&ctx, snapshot_with_error(Some("auth failure")), false)
            .expect("applied");
        assert_eq!(second.new_error, None);

        let changed = state
            .apply_snapshot(&ctx, snapshot_with_error(Some("browser crashed")), false)
            .expect("applied");
        assert_eq!(changed.new_error.as_deref(), Some("browser crashed"));
    }

    #[test]
    fn cleared_error_allows_same_message_again() {
        let mut state = DashboardState::new(9_000);
        assert_eq!(
            state.note_last_error("ws-1", Some("timeout")).as_deref(),
            Some("timeout")
        );
        assert_eq!(state.note_last_error("ws-1", Some("timeout")), None);
        assert_eq!(state.note_last_error("ws-1", None), None);
        assert_eq!(
            state.note_last_error("ws-1", Some("timeout")).as_deref(),
            Some("timeout")
        );
    }

    #[test]
    fn errors_are_tracked_per_workspace() {
        let mut state = DashboardState::new(9_000);
        assert!(state.note_last_error("ws-1", Some("timeout")).is_some());
        assert!(state.note_last_error("ws-2", Some("timeout")).is_some());
        assert!(state.note_last_error("ws-1", Some("timeout")).is_none());
    }

    #[test]
    fn stale_context_is_not_applied() {
        let mut state = DashboardState::new(9_000);
        state.begin_session(None);
        let old = state.select_workspace("ws-1".to_string());
        let _new = state.select_workspace("ws-2".to_string());
        assert!(old.cancel.is_cancelled());
        assert!(state
            .apply_snapshot(&old, SessionSnapshot::default(), false)
            .is_none());
        assert!(state.snapshot().is_none());
    }

    #[test]
    fn elapsed_ticks_only_while_connecting() {
        let mut state = DashboardState::new(9_000);
        state.begin_session(None);
        let ctx = state.select_workspace("ws-1".to_string());
        assert_eq!(state.tick_elapsed(), None);

        let connecting = SessionSnapshot {
            status: SessionStatus::QrReady,
            connect_elapsed_sec: 10,
            ..SessionSnapshot::default()
        };
        state.apply_snapshot(&ctx, connecting, false).expect("applied");
        assert!(state.connect_active());
        assert_eq!(state.tick_elapsed().as_deref(), Some("Connect timer: 11s"));
        assert_eq!(state.tick_elapsed().as_deref(), Some("Connect timer: 12s"));

        let ready = SessionSnapshot {
            status: SessionStatus::Ready,
            ready: true,
            connect_elapsed_sec: 14,
            ..SessionSnapshot::default()
        };
        state.apply_snapshot(&ctx, ready, false).expect("applied");
        assert_eq!(state.elapsed_secs(), 14);
        assert_eq!(state.tick_elapsed(), None);
    }

    #[test]
    fn end_session_cancels_workspace_and_timers() {
        let mut state = DashboardState::new(9_000);
        let session = state.begin_session(Some("ops@example.com".to_string()));
        let ctx = state.select_workspace("ws-1".to_string());
        assert_eq!(state.session_email(), Some("ops@example.com"));
        assert!(state.end_session());
        assert!(session.is_cancelled());
        assert!(ctx.cancel.is_cancelled());
        assert!(!state.is_authenticated());
        assert!(state.workspace().is_none());
        assert!(!state.end_session());
    }
}
