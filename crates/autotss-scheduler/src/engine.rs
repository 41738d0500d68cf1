use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::batch::BatchScheduler;

/// Drives [`BatchScheduler::run_batch`] on a fixed interval.
///
/// The first pass starts immediately. A pass that overruns the interval
/// delays the next tick rather than triggering a burst of catch-up passes.
pub struct SchedulerEngine {
    batch: Arc<BatchScheduler>,
    interval: Duration,
}

impl SchedulerEngine {
    /// A zero `interval` is raised to one second.
    pub fn new(batch: Arc<BatchScheduler>, interval: Duration) -> Self {
        Self {
            batch,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// Main event loop. Runs until `shutdown` broadcasts `true` or its sender
    /// is dropped. A pass in progress is finished before shutting down.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "scheduler engine started");

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.batch.run_batch().await {
                        error!("scheduler pass failed: {e}");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("scheduler engine shutting down");
                        break;
                    }
                }
            }
        }
    }
}
