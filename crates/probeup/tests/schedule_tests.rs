//! Schedule loop tests on tokio's paused clock

mod common;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{CountingProber, FailingProber};
use probeup::{
    BatchResultSet, CheckpointStore, Dispatcher, Error, MemorySink, ResultSink, ScheduleConfig,
    ScheduleLoop, SinkEvent, StatusClass, Target, enumerate_jobs,
};
use tempfile::tempdir;

const MINUTE: Duration = Duration::from_secs(60);

fn target() -> Target {
    Target::new("http://127.0.0.1:9").unwrap()
}

/// Sink that snapshots the checkpoint iteration whenever it is called
struct CheckpointWatcher {
    store: CheckpointStore,
    seen_at_start: Vec<Option<u64>>,
    seen_after_batch: Vec<Option<u64>>,
}

impl CheckpointWatcher {
    fn iteration_on_disk(&self) -> Option<u64> {
        self.store.load().unwrap().map(|c| c.iteration)
    }
}

impl ResultSink for CheckpointWatcher {
    fn iteration_started(&mut self, _iteration: u64, _at: DateTime<Utc>) -> io::Result<()> {
        let seen = self.iteration_on_disk();
        self.seen_at_start.push(seen);
        Ok(())
    }

    fn record_batch(&mut self, _batch: &BatchResultSet) -> io::Result<()> {
        let seen = self.iteration_on_disk();
        self.seen_after_batch.push(seen);
        Ok(())
    }

    fn monitoring_completed(&mut self, _at: DateTime<Utc>) -> io::Result<()> {
        Ok(())
    }
}

/// Sink whose every write fails
struct BrokenSink;

impl ResultSink for BrokenSink {
    fn iteration_started(&mut self, _iteration: u64, _at: DateTime<Utc>) -> io::Result<()> {
        Err(io::Error::other("disk full"))
    }

    fn record_batch(&mut self, _batch: &BatchResultSet) -> io::Result<()> {
        Err(io::Error::other("disk full"))
    }

    fn monitoring_completed(&mut self, _at: DateTime<Utc>) -> io::Result<()> {
        Err(io::Error::other("disk full"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_hour_at_half_hour_interval_runs_twice() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("status.json"));
    let jobs = enumerate_jobs(&["/a", "/b"], &["GET", "POST"]);
    let dispatcher = Dispatcher::new(CountingProber::with_delay(Duration::ZERO), target(), 2);
    let config = ScheduleConfig::new(30 * MINUTE, 60 * MINUTE);

    let started = tokio::time::Instant::now();
    let mut sink = MemorySink::default();
    let summary = ScheduleLoop::new(&dispatcher, &jobs, &store, config)
        .unwrap()
        .run(&mut sink)
        .await;

    assert_eq!(summary.iterations, 2);
    assert_eq!(summary.iterations, config.expected_iterations());
    // One interval slept, no trailing sleep after the last batch
    assert_eq!(started.elapsed(), 30 * MINUTE);
    assert_eq!(
        sink.events,
        vec![
            SinkEvent::IterationStarted(1),
            SinkEvent::Batch(4),
            SinkEvent::IterationStarted(2),
            SinkEvent::Batch(4),
            SinkEvent::Completed,
        ]
    );
    assert!(!store.path().exists());
}

#[tokio::test(start_paused = true)]
async fn test_iterations_round_up() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("status.json"));
    let jobs = enumerate_jobs(&["/a"], &["GET"]);
    let dispatcher = Dispatcher::new(CountingProber::with_delay(Duration::ZERO), target(), 1);

    for (interval, duration, expected) in
        [(30, 61, 3), (30, 90, 3), (30, 10, 1), (30, 24 * 60, 48)]
    {
        let config = ScheduleConfig::new(interval * MINUTE, duration * MINUTE);
        let mut sink = MemorySink::default();

        let summary =
            ScheduleLoop::new(&dispatcher, &jobs, &store, config).unwrap().run(&mut sink).await;

        assert_eq!(summary.iterations, expected, "interval {interval}m duration {duration}m");
        assert_eq!(sink.batches.len() as u64, expected);
    }
}

#[tokio::test(start_paused = true)]
async fn test_checkpoint_advances_by_one_per_batch() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("status.json"));
    let jobs = enumerate_jobs(&["/a", "/b"], &["GET", "POST"]);
    let dispatcher = Dispatcher::new(CountingProber::with_delay(Duration::ZERO), target(), 2);
    let config = ScheduleConfig::new(30 * MINUTE, 120 * MINUTE);

    let mut watcher = CheckpointWatcher {
        store: store.clone(),
        seen_at_start: Vec::new(),
        seen_after_batch: Vec::new(),
    };
    ScheduleLoop::new(&dispatcher, &jobs, &store, config).unwrap().run(&mut watcher).await;

    assert_eq!(watcher.seen_at_start, vec![Some(0), Some(1), Some(2), Some(3)]);
    // The batch is handed to the sink before the checkpoint is updated
    assert_eq!(watcher.seen_after_batch, vec![Some(0), Some(1), Some(2), Some(3)]);
    assert!(!store.path().exists());
}

#[tokio::test(start_paused = true)]
async fn test_checkpoint_records_worker_pid_and_next_check() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("status.json"));
    let jobs = enumerate_jobs(&["/a"], &["GET"]);
    let dispatcher = Dispatcher::new(CountingProber::with_delay(Duration::ZERO), target(), 1);
    let config = ScheduleConfig::new(30 * MINUTE, 60 * MINUTE);

    struct Inspect(CheckpointStore, Vec<probeup::Checkpoint>);
    impl ResultSink for Inspect {
        fn iteration_started(&mut self, _: u64, _: DateTime<Utc>) -> io::Result<()> {
            Ok(())
        }
        fn record_batch(&mut self, _: &BatchResultSet) -> io::Result<()> {
            Ok(())
        }
        fn monitoring_completed(&mut self, _: DateTime<Utc>) -> io::Result<()> {
            self.1.extend(self.0.load().unwrap());
            Ok(())
        }
    }

    let mut inspect = Inspect(store.clone(), Vec::new());
    ScheduleLoop::new(&dispatcher, &jobs, &store, config).unwrap().run(&mut inspect).await;

    let last = inspect.1.pop().expect("checkpoint present until completion");
    assert_eq!(last.pid, std::process::id());
    assert_eq!(last.iteration, 2);
    assert!(last.next_check_time > last.start_time);
}

#[tokio::test(start_paused = true)]
async fn test_all_failing_batches_still_advance() {
    let dir = tempdir().unwrap();
    let store = CheckpointStore::new(dir.path().join("status.json"));
    let jobs = enumerate_jobs(&["/a", "/b", "/c"], &["GET"]);
    let dispatcher = Dispatcher::new(Arc::new(FailingProber), target(), 3);
    let config = ScheduleConfig::new(30 * MINUTE, 90 * MINUTE);

    let mut sink = MemorySink::default();
    let summary =
        ScheduleLoop::new(&dispatcher, &jobs, &store, config).unwrap().run(&mut sink).await;

    assert_eq!(summary.iterations, 3);
    for batch in &sink.batches {
        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|r| r.status_class == StatusClass::Error));
    }
}

#[tokio::test(start_paused = true)]
async fn test_sink_and_checkpoint_failures_are_ignored() {
    let dir = tempdir().unwrap();
    // Parent directory does not exist, so every checkpoint write fails
    let store = CheckpointStore::new(dir.path().join("missing").join("status.json"));
    let jobs = enumerate_jobs(&["/a"], &["GET", "POST"]);
    let prober = CountingProber::with_delay(Duration::ZERO);
    let dispatcher = Dispatcher::new(prober.clone(), target(), 1);
    let config = ScheduleConfig::new(30 * MINUTE, 60 * MINUTE);

    let summary =
        ScheduleLoop::new(&dispatcher, &jobs, &store, config).unwrap().run(&mut BrokenSink).await;

    assert_eq!(summary.iterations, 2);
    assert_eq!(prober.calls(), 4);
}

#[test]
fn test_empty_job_set_is_rejected() {
    let store = CheckpointStore::default();
    let dispatcher = Dispatcher::new(Arc::new(FailingProber), target(), 1);

    let result = ScheduleLoop::new(&dispatcher, &[], &store, ScheduleConfig::default());

    assert!(matches!(result, Err(Error::NoJobs)));
}
