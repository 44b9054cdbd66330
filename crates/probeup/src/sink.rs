//! Output sink contract for monitoring runs.

use std::io;

use chrono::{DateTime, Utc};

use crate::dispatcher::BatchResultSet;

/// Append-only destination for monitoring output.
///
/// How results are rendered is up to the implementation; the schedule loop
/// only decides what is written and in which order.
pub trait ResultSink: Send {
    /// Called before the batch of an iteration runs
    fn iteration_started(&mut self, iteration: u64, at: DateTime<Utc>) -> io::Result<()>;

    /// Called with every completed batch
    fn record_batch(&mut self, batch: &BatchResultSet) -> io::Result<()>;

    /// Called once after the final iteration of a monitoring run
    fn monitoring_completed(&mut self, at: DateTime<Utc>) -> io::Result<()>;
}

/// Everything a sink was told, in order
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    IterationStarted(u64),
    Batch(usize),
    Completed,
}

/// Sink keeping a log of what it received, handy for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySink {
    pub events: Vec<SinkEvent>,
    pub batches: Vec<BatchResultSet>,
}

impl ResultSink for MemorySink {
    fn iteration_started(&mut self, iteration: u64, _at: DateTime<Utc>) -> io::Result<()> {
        self.events.push(SinkEvent::IterationStarted(iteration));
        Ok(())
    }

    fn record_batch(&mut self, batch: &BatchResultSet) -> io::Result<()> {
        self.events.push(SinkEvent::Batch(batch.len()));
        self.batches.push(batch.clone());
        Ok(())
    }

    fn monitoring_completed(&mut self, _at: DateTime<Utc>) -> io::Result<()> {
        self.events.push(SinkEvent::Completed);
        Ok(())
    }
}
