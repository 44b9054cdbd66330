//! Batch-scoped result collection shared by probe tasks.

use parking_lot::Mutex;

use crate::probe::ProbeResult;

/// Append-only, unordered collection of the results of one batch
#[derive(Debug, Default)]
pub(crate) struct ResultAggregator {
    results: Mutex<Vec<ProbeResult>>,
}

impl ResultAggregator {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self { results: Mutex::new(Vec::with_capacity(capacity)) }
    }

    pub(crate) fn push(&self, result: ProbeResult) {
        self.results.lock().push(result);
    }

    pub(crate) fn len(&self) -> usize {
        self.results.lock().len()
    }

    /// Take everything collected so far, leaving the aggregator empty
    pub(crate) fn drain(&self) -> Vec<ProbeResult> {
        std::mem::take(&mut *self.results.lock())
    }
}
