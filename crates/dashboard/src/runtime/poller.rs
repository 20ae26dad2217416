use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::DashboardEvent;

use super::status::refresh_status;
use super::RuntimeContext;

/// Fixed-interval status poll; exits when `shutdown` fires.
///
/// Each tick spawns a refresh so a slow request never delays the schedule.
/// Ticks landing while a refresh is outstanding are skipped by its guard.
pub(crate) fn spawn_status_poller(ctx: RuntimeContext, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = ctx.settings.status_interval;
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            event = "status.poller.started",
            interval_ms = period.as_millis() as u64,
            "status poller started"
        );
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let ctx = ctx.clone();
            tokio::spawn(async move {
                if let Err(err) = refresh_status(&ctx).await {
                    debug!(event = "status.poll.idle", reason = %err, "status poll skipped");
                }
            });
        }
        info!(event = "status.poller.stopped", "status poller stopped");
    })
}

/// Advances the connect timer between polls while a connection attempt runs.
pub(crate) fn spawn_elapsed_ticker(ctx: RuntimeContext, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = ctx.settings.elapsed_tick;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let text = {
                let mut state = ctx.state.write().await;
                state.tick_elapsed()
            };
            if let Some(text) = text {
                ctx.emit(DashboardEvent::ElapsedTick { text });
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{drain_events, test_context, FakeApi};
    use protocol::{SessionSnapshot, SessionStatus};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn slow_status_requests_never_overlap() {
        let api = FakeApi::new();
        api.set_status_delay(Duration::from_secs(12));
        let (ctx, _rx) = test_context(api.clone());
        let session = ctx.state.write().await.begin_session(None);
        ctx.state.write().await.select_workspace("ws-1".to_string());

        let handle = spawn_status_poller(ctx.clone(), session.clone());
        tokio::time::sleep(Duration::from_secs(31)).await;
        session.cancel();
        handle.await.expect("poller");

        assert_eq!(api.status_max_in_flight.load(Ordering::SeqCst), 1);
        // Requests start at 0s, 15s and 30s; the ticks in between are dropped.
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn polls_on_fixed_interval() {
        let api = FakeApi::new();
        let (ctx, _rx) = test_context(api.clone());
        let session = ctx.state.write().await.begin_session(None);
        ctx.state.write().await.select_workspace("ws-1".to_string());

        let handle = spawn_status_poller(ctx.clone(), session.clone());
        tokio::time::sleep(Duration::from_millis(10_100)).await;
        session.cancel();
        handle.await.expect("poller");
        assert_eq!(api.status_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_ticker_interpolates_while_connecting() {
        let (ctx, mut rx) = test_context(FakeApi::new());
        let session = ctx.state.write().await.begin_session(None);
        let workspace = ctx.state.write().await.select_workspace("ws-1".to_string());
        ctx.state.write().await.apply_snapshot(
            &workspace,
            SessionSnapshot {
                status: SessionStatus::QrReady,
                connect_elapsed_sec: 5,
                ..SessionSnapshot::default()
            },
            false,
        );

        let handle = spawn_elapsed_ticker(ctx.clone(), session.clone());
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        session.cancel();
        handle.await.expect("ticker");

        let ticks: Vec<String> = drain_events(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                DashboardEvent::ElapsedTick { text } => Some(text),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec!["Connect timer: 6s", "Connect timer: 7s"]);
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_ticker_is_silent_when_idle() {
        let (ctx, mut rx) = test_context(FakeApi::new());
        let session = ctx.state.write().await.begin_session(None);
        let handle = spawn_elapsed_ticker(ctx.clone(), session.clone());
        tokio::time::sleep(Duration::from_secs(5)).await;
        session.cancel();
        handle.await.expect("ticker");
        assert!(drain_events(&mut rx).is_empty());
    }
}
