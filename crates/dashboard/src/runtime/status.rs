use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::events::DashboardEvent;

use super::RuntimeContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RefreshOutcome {
    /// Snapshot reconciled into the active workspace.
    Applied,
    /// Another refresh was outstanding; no request was made.
    Skipped,
    /// The workspace changed while the request was in flight.
    Stale,
    /// Request failed; the previous view was kept.
    Failed,
}

/// Fetches the active workspace's session status and reconciles it.
///
/// Failures are logged and swallowed; the next poll tick is the retry.
/// Only a missing workspace selection is returned as an error.
pub(crate) async fn refresh_status(ctx: &RuntimeContext) -> Result<RefreshOutcome, ApiError> {
    let Some(_guard) = ctx.guards.status.try_acquire() else {
        debug!(event = "status.refresh.skipped", "status refresh already in flight");
        return Ok(RefreshOutcome::Skipped);
    };
    let workspace = {
        let state = ctx.state.read().await;
        state.workspace()
    };
    let Some(workspace) = workspace else {
        return Err(ApiError::precondition("Select a workspace first"));
    };

    let result = tokio::select! {
        biased;
        _ = workspace.cancel.cancelled() => {
            debug!(
                event = "status.refresh.aborted",
                workspace = %workspace.id,
                "workspace changed during status refresh"
            );
            return Ok(RefreshOutcome::Stale);
        }
        result = ctx.api.workspace_status(&workspace.id) => result,
    };

    match result {
        Ok(snapshot) => {
            debug!(
                event = "status.refresh.ok",
                workspace = %workspace.id,
                status = snapshot.status.label(),
                ready = snapshot.ready
            );
            let applied = {
                let mut state = ctx.state.write().await;
                state.apply_snapshot(&workspace, snapshot, ctx.guards.campaign.is_held())
            };
            let Some(applied) = applied else {
                return Ok(RefreshOutcome::Stale);
            };
            if let Some(error) = applied.new_error {
                warn!(
                    event = "session.error",
                    workspace = %workspace.id,
                    error = %error,
                    "workspace session reported an error"
                );
                ctx.log(&format!("Session error: {error}")).await;
            }
            let can_send = applied.view.can_send;
            ctx.emit(DashboardEvent::StatusUpdated { view: applied.view });
            ctx.emit(DashboardEvent::SendControl { enabled: can_send });
            Ok(RefreshOutcome::Applied)
        }
        Err(err) if err.is_unauthorized() => {
            info!(event = "status.refresh.unauthorized", workspace = %workspace.id);
            ctx.logout("status refresh unauthorized").await;
            Ok(RefreshOutcome::Failed)
        }
        Err(err) => {
            let current = ctx.state.read().await.is_current(&workspace);
            if !current {
                return Ok(RefreshOutcome::Stale);
            }
            warn!(
                event = "status.refresh.failed",
                workspace = %workspace.id,
                error = %err,
                "status refresh failed"
            );
            ctx.log(&format!("Status refresh failed: {err}")).await;
            Ok(RefreshOutcome::Failed)
        }
    }
}
