//! Bounded-concurrency batch execution.
//!
//! A batch spawns one task per job. Each task must take a permit from the
//! admission gate before probing and gives it back as soon as the probe is
//! done, so no more than `concurrency` probes are ever in flight. `run`
//! returns only once every task has finished.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::aggregator::ResultAggregator;
use crate::job::Job;
use crate::probe::{ProbeResult, Prober, StatusClass};
use crate::target::Target;

/// Results of one batch. Order is unspecified.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct BatchResultSet {
    results: Vec<ProbeResult>,
}

/// Number of results sharing a status code and class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCount {
    pub status_code: u16,
    pub status_class: StatusClass,
    pub count: usize,
}

impl BatchResultSet {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProbeResult> {
        self.results.iter()
    }

    pub fn into_vec(self) -> Vec<ProbeResult> {
        self.results
    }

    /// Count results per (status code, class), ordered by status code
    pub fn summary(&self) -> Vec<StatusCount> {
        let mut counts: BTreeMap<(u16, StatusClass), usize> = BTreeMap::new();
        for result in &self.results {
            *counts.entry((result.status_code, result.status_class)).or_default() += 1;
        }

        counts
            .into_iter()
            .map(|((status_code, status_class), count)| StatusCount {
                status_code,
                status_class,
                count,
            })
            .collect()
    }
}

impl From<Vec<ProbeResult>> for BatchResultSet {
    fn from(results: Vec<ProbeResult>) -> Self {
        Self { results }
    }
}

impl IntoIterator for BatchResultSet {
    type Item = ProbeResult;
    type IntoIter = std::vec::IntoIter<ProbeResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a BatchResultSet {
    type Item = &'a ProbeResult;
    type IntoIter = std::slice::Iter<'a, ProbeResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Runs batches of jobs with a fixed bound on in-flight probes
pub struct Dispatcher {
    prober: Arc<dyn Prober>,
    target: Target,
    concurrency: usize,
    progress: Option<mpsc::UnboundedSender<ProbeResult>>,
}

impl Dispatcher {
    /// Create a dispatcher. A bound of 0 is treated as 1.
    pub fn new(prober: Arc<dyn Prober>, target: Target, concurrency: usize) -> Self {
        Self { prober, target, concurrency: concurrency.max(1), progress: None }
    }

    /// Also send every result to `progress` as soon as its probe completes
    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<ProbeResult>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Probe every job and wait for all of them.
    ///
    /// Always returns exactly one result per job. A task that dies before
    /// recording its result is reported as an `ERROR` result for its job.
    pub async fn run(&self, jobs: &[Job]) -> BatchResultSet {
        let gate = Arc::new(Semaphore::new(self.concurrency));
        let aggregator = Arc::new(ResultAggregator::with_capacity(jobs.len()));
        let mut tasks = JoinSet::new();

        debug!(jobs = jobs.len(), concurrency = self.concurrency, "Dispatching batch");

        for (index, job) in jobs.iter().enumerate() {
            let url = self.target.url_for(&job.path);
            let job = job.clone();
            let prober = Arc::clone(&self.prober);
            let gate = Arc::clone(&gate);
            let aggregator = Arc::clone(&aggregator);
            let progress = self.progress.clone();

            tasks.spawn(async move {
                let result = match gate.acquire_owned().await {
                    Ok(permit) => {
                        let result = prober.probe(&url, &job.path, &job.method).await;
                        drop(permit);
                        result
                    }
                    Err(e) => ProbeResult::new(url, job.path, job.method)
                        .failure(format!("Admission gate unavailable: {e}")),
                };

                if let Some(progress) = &progress {
                    // Nobody listening is fine; the batch result is what counts
                    let _ = progress.send(result.clone());
                }

                aggregator.push(result);
                index
            });
        }

        let mut recorded = vec![false; jobs.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(index) => recorded[index] = true,
                Err(e) => error!("Probe task failed: {e}"),
            }
        }

        for (job, _) in jobs.iter().zip(&recorded).filter(|(_, done)| !**done) {
            let result = ProbeResult::new(self.target.url_for(&job.path), &job.path, &job.method)
                .failure("Probe task failed before producing a result");
            if let Some(progress) = &self.progress {
                let _ = progress.send(result.clone());
            }
            aggregator.push(result);
        }

        debug!(results = aggregator.len(), "Batch complete");
        BatchResultSet::from(aggregator.drain())
    }
}
