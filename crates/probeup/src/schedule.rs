//! Fixed-cadence monitoring loop run by the background worker.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::dispatcher::Dispatcher;
use crate::job::Job;
use crate::sink::ResultSink;
use crate::{Error, Result};

/// Cadence and length of a monitoring run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Time between the starts of consecutive batches
    pub interval: Duration,
    /// Total length of the run
    pub duration: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval: Duration::from_secs(30 * 60), duration: Duration::from_secs(24 * 3600) }
    }
}

impl ScheduleConfig {
    pub fn new(interval: Duration, duration: Duration) -> Self {
        Self { interval, duration }
    }

    /// Iterations a run performs when batches take no time
    pub fn expected_iterations(&self) -> u64 {
        if self.duration.is_zero() {
            return 0;
        }
        if self.interval.is_zero() {
            return u64::MAX;
        }
        self.duration.as_nanos().div_ceil(self.interval.as_nanos()) as u64
    }
}

/// Outcome of a completed monitoring run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub iterations: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Repeats one batch on a fixed schedule, checkpointing after every batch
pub struct ScheduleLoop<'a> {
    dispatcher: &'a Dispatcher,
    jobs: &'a [Job],
    store: &'a CheckpointStore,
    config: ScheduleConfig,
    pid: u32,
}

impl<'a> ScheduleLoop<'a> {
    pub fn new(
        dispatcher: &'a Dispatcher,
        jobs: &'a [Job],
        store: &'a CheckpointStore,
        config: ScheduleConfig,
    ) -> Result<Self> {
        if jobs.is_empty() {
            return Err(Error::NoJobs);
        }

        Ok(Self { dispatcher, jobs, store, config, pid: std::process::id() })
    }

    /// Run until the configured duration has elapsed.
    ///
    /// Batches are never retried; a batch where every probe failed still
    /// counts as an iteration. Checkpoint and sink failures are logged and
    /// otherwise ignored. The checkpoint is removed when the run completes.
    pub async fn run(&self, sink: &mut dyn ResultSink) -> ScheduleSummary {
        let ScheduleConfig { interval, duration } = self.config;
        let started = Instant::now();
        let started_at = Utc::now();

        let mut checkpoint = Checkpoint::started(self.pid, started_at, Duration::ZERO);
        self.persist(&checkpoint);

        info!(
            jobs = self.jobs.len(),
            interval_secs = interval.as_secs(),
            duration_secs = duration.as_secs(),
            "Monitoring started"
        );

        let mut iteration = 0;
        while started.elapsed() < duration {
            iteration += 1;
            info!(iteration, "Running monitoring iteration");

            if let Err(e) = sink.iteration_started(iteration, Utc::now()) {
                warn!(iteration, "Failed to write iteration header: {e}");
            }

            let batch = self.dispatcher.run(self.jobs).await;

            if let Err(e) = sink.record_batch(&batch) {
                warn!(iteration, "Failed to write batch results: {e}");
            }

            checkpoint.advance(iteration, Utc::now(), interval);
            self.persist(&checkpoint);

            if started.elapsed() + interval >= duration {
                break;
            }

            sleep(interval).await;
        }

        let finished_at = Utc::now();
        if let Err(e) = sink.monitoring_completed(finished_at) {
            warn!("Failed to write completion marker: {e}");
        }

        if let Err(e) = self.store.remove() {
            warn!("Failed to remove checkpoint: {e}");
        }

        info!(iterations = iteration, "Monitoring completed");

        ScheduleSummary { iterations: iteration, started_at, finished_at }
    }

    fn persist(&self, checkpoint: &Checkpoint) {
        if let Err(e) = self.store.save(checkpoint) {
            warn!(iteration = checkpoint.iteration, "Failed to save checkpoint: {e}");
        }
    }
}
