//! ProbeUP - bounded-concurrency HTTP probe engine for Firey
//!
//! This library expands a set of resource paths and HTTP methods into probe
//! jobs, runs them against a target with a fixed upper bound on in-flight
//! requests, and can repeat that batch on a fixed schedule from a detached
//! background worker that checkpoints its progress to disk.

pub mod checkpoint;
pub mod daemon;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod probe;
pub mod schedule;
pub mod sink;
pub mod target;

mod aggregator;

// Re-export main types
pub use checkpoint::{Checkpoint, CheckpointStatus, CheckpointStore};
pub use daemon::{LaunchReport, Role, WORKER_MARKER, WorkerCommand, launch_worker};
pub use dispatcher::{BatchResultSet, Dispatcher, StatusCount};
pub use error::Error;
pub use job::{Job, enumerate_jobs};
pub use probe::{HttpProber, ProbeResult, Prober, StatusClass};
pub use schedule::{ScheduleConfig, ScheduleLoop, ScheduleSummary};
pub use sink::{MemorySink, ResultSink, SinkEvent};
pub use target::Target;

/// ProbeUP result type
pub type Result<T> = std::result::Result<T, Error>;

/// Timeout applied to every probe request
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

/// Methods probed when the operator does not choose any
pub const DEFAULT_METHODS: [&str; 4] = ["GET", "POST", "PATCH", "DELETE"];

/// Checkpoint file written next to the working directory of the monitor
pub const DEFAULT_CHECKPOINT_FILE: &str = ".firey_status.json";
