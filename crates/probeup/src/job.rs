//! Probe job enumeration.

use serde::{Deserialize, Serialize};

/// One (path, method) pair to probe
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Job {
    pub path: String,
    pub method: String,
}

impl Job {
    pub fn new(path: impl Into<String>, method: impl Into<String>) -> Self {
        Self { path: path.into(), method: method.into() }
    }
}

/// Expand paths and methods into the full cross-product of jobs.
///
/// Jobs come out path-major in input order. Duplicates are kept: probing the
/// same pair twice is the operator's call, not ours.
pub fn enumerate_jobs<P, M>(paths: &[P], methods: &[M]) -> Vec<Job>
where
    P: AsRef<str>,
    M: AsRef<str>,
{
    let mut jobs = Vec::with_capacity(paths.len() * methods.len());
    for path in paths {
        for method in methods {
            jobs.push(Job::new(path.as_ref(), method.as_ref()));
        }
    }
    jobs
}
