//! Background refresh of the console session.
//!
//! Runs the pipeline as a background run once at startup and then on a fixed
//! interval (10 hours by default). Each tick spawns an independent run; there
//! is no jitter, no backoff and no guard against a previous run still being in
//! flight.

use super::pipeline::ConsolePipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct RefreshScheduler {
    pipeline: Arc<ConsolePipeline>,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(pipeline: Arc<ConsolePipeline>) -> Self {
        let interval = pipeline.config().refresh_interval();
        Self { pipeline, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking. The first run starts immediately.
    ///
    /// Cancelling `shutdown` stops new ticks; the returned handle completes
    /// once the runs already in flight have finished.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run_loop(shutdown))
    }

    async fn run_loop(self, shutdown: CancellationToken) {
        info!("Refresh scheduler started, interval {:?}", self.interval);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut runs = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let pipeline = self.pipeline.clone();
                    runs.spawn(async move {
                        let outcome = pipeline.run(false).await;
                        debug!("Background refresh {}", outcome);
                    });
                }
                Some(_) = runs.join_next(), if !runs.is_empty() => {}
            }
        }

        info!("Refresh scheduler stopping, {} run(s) in flight", runs.len());
        while runs.join_next().await.is_some() {}
    }
}
