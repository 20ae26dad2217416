use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::events::DashboardEvent;

/// Publishes progress updates for one campaign dispatch.
#[derive(Clone)]
pub(crate) struct ProgressSink {
    event_tx: broadcast::Sender<DashboardEvent>,
}

impl ProgressSink {
    pub(crate) fn new(event_tx: broadcast::Sender<DashboardEvent>) -> Self {
        Self { event_tx }
    }

    pub(crate) fn report(&self, done: usize, total: usize) {
        let _ = self.event_tx.send(DashboardEvent::Progress { done, total });
    }
}

/// Drives the progress display after the backend accepted a campaign.
///
/// The backend only reports the final result count, so implementations
/// decide how `0..=total` is paced.
#[async_trait]
pub(crate) trait ProgressEstimator: Send + Sync {
    async fn run(&self, total: usize, sink: &ProgressSink);
}

/// Advances one result per fixed step.
pub(crate) struct SimulatedProgress {
    step: Duration,
}

impl SimulatedProgress {
    pub(crate) fn new(step: Duration) -> Self {
        Self { step }
    }
}

#[async_trait]
impl ProgressEstimator for SimulatedProgress {
    async fn run(&self, total: usize, sink: &ProgressSink) {
        sink.report(0, total);
        let mut ticker = interval_at(Instant::now() + self.step, self.step);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        for done in 1..=total {
            ticker.tick().await;
            sink.report(done, total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::drain_events;

    #[tokio::test(start_paused = true)]
    async fn simulated_progress_steps_to_total() {
        let (tx, mut rx) = broadcast::channel(32);
        let sink = ProgressSink::new(tx);
        let started = Instant::now();
        SimulatedProgress::new(Duration::from_millis(100))
            .run(3, &sink)
            .await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(300) && elapsed < Duration::from_millis(400));

        let steps: Vec<(usize, usize)> = drain_events(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                DashboardEvent::Progress { done, total } => Some((done, total)),
                _ => None,
            })
            .collect();
        assert_eq!(steps, vec![(0, 3), (1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_results_report_once() {
        let (tx, mut rx) = broadcast::channel(8);
        SimulatedProgress::new(Duration::from_millis(100))
            .run(0, &ProgressSink::new(tx))
            .await;
        assert_eq!(drain_events(&mut rx).len(), 1);
    }
}
