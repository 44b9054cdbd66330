//! On-disk checkpoint of a running monitor.
//!
//! The checkpoint exists only while a monitoring run is active. It is
//! written when the worker is launched, overwritten after every iteration
//! and removed when the run completes. A checkpoint left behind by a killed
//! worker is reported as stale, never cleaned up automatically.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, RefreshKind, System};
use tracing::debug;

use crate::{DEFAULT_CHECKPOINT_FILE, Error, Result};

/// Identity and progress of a monitoring run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Process id of the worker running the schedule
    pub pid: u32,

    /// When the run started
    pub start_time: DateTime<Utc>,

    /// When the next batch is expected to start
    #[serde(rename = "next_check")]
    pub next_check_time: DateTime<Utc>,

    /// Number of completed iterations
    pub iteration: u64,
}

impl Checkpoint {
    /// Checkpoint for a run that has not completed any iteration yet
    pub fn started(pid: u32, now: DateTime<Utc>, interval: Duration) -> Self {
        Self { pid, start_time: now, next_check_time: add_interval(now, interval), iteration: 0 }
    }

    /// Record a completed iteration
    pub fn advance(&mut self, iteration: u64, now: DateTime<Utc>, interval: Duration) {
        self.iteration = self.iteration.max(iteration);
        self.next_check_time = add_interval(now, interval);
    }
}

fn add_interval(now: DateTime<Utc>, interval: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(interval)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// What the checkpoint file says about the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointStatus {
    /// No checkpoint: nothing started, or the last run finished normally
    Absent,
    /// Checkpoint whose worker process is alive
    Running(Checkpoint),
    /// Checkpoint whose worker process is gone; the run ended abnormally
    Stale(Checkpoint),
}

/// Location of the checkpoint file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl Default for CheckpointStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKPOINT_FILE)
    }
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the checkpoint. Readers never observe a partial file.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let data = serde_json::to_vec_pretty(checkpoint).map_err(|source| {
            Error::CheckpointFormat { path: self.path.clone(), source }
        })?;

        let staging = self.staging_path();
        fs::write(&staging, data).map_err(|source| self.io_error(source))?;
        fs::rename(&staging, &self.path).map_err(|source| {
            let _ = fs::remove_file(&staging);
            self.io_error(source)
        })?;

        debug!(path = %self.path.display(), iteration = checkpoint.iteration, "Checkpoint saved");
        Ok(())
    }

    /// Read the checkpoint, `None` when there is none
    pub fn load(&self) -> Result<Option<Checkpoint>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| Error::CheckpointFormat { path: self.path.clone(), source })
    }

    /// Delete the checkpoint; deleting a missing one is not an error
    pub fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    /// Inspect the checkpoint and check whether its worker still runs
    pub fn status(&self) -> Result<CheckpointStatus> {
        Ok(match self.load()? {
            None => CheckpointStatus::Absent,
            Some(checkpoint) if process_is_alive(checkpoint.pid) => {
                CheckpointStatus::Running(checkpoint)
            }
            Some(checkpoint) => CheckpointStatus::Stale(checkpoint),
        })
    }

    fn staging_path(&self) -> PathBuf {
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        PathBuf::from(staging)
    }

    fn io_error(&self, source: std::io::Error) -> Error {
        Error::CheckpointIo { path: self.path.clone(), source }
    }
}

/// Whether `pid` names a live (non-zombie) process
pub fn process_is_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);

    let mut system = System::new_with_specifics(RefreshKind::nothing());
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing(),
    );

    system.process(pid).is_some_and(|process| process.status() != ProcessStatus::Zombie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_save_load_remove() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("status.json"));

        assert_eq!(store.load().unwrap(), None);

        let checkpoint = Checkpoint::started(42, Utc::now(), HOUR);
        store.save(&checkpoint).unwrap();
        assert_eq!(store.load().unwrap(), Some(checkpoint));
        assert!(!store.staging_path().exists());

        store.remove().unwrap();
        assert!(!store.path().exists());
        store.remove().unwrap();
    }

    #[test]
    fn test_file_format() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("status.json"));

        store.save(&Checkpoint::started(7, Utc::now(), HOUR)).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();

        assert_eq!(json["pid"], 7);
        assert_eq!(json["iteration"], 0);
        assert!(json["start_time"].is_string());
        assert!(json["next_check"].is_string());
    }

    #[test]
    fn test_started_and_advance() {
        let now = Utc::now();
        let mut checkpoint = Checkpoint::started(1, now, HOUR);
        assert_eq!(checkpoint.next_check_time - checkpoint.start_time, TimeDelta::hours(1));

        let later = now + TimeDelta::minutes(5);
        checkpoint.advance(3, later, HOUR);
        assert_eq!(checkpoint.iteration, 3);
        assert_eq!(checkpoint.next_check_time, later + TimeDelta::hours(1));

        // Iteration never goes backwards
        checkpoint.advance(2, later, HOUR);
        assert_eq!(checkpoint.iteration, 3);
    }

    #[test]
    fn test_malformed_checkpoint() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("status.json"));
        fs::write(store.path(), "not json").unwrap();

        assert!(matches!(store.load(), Err(Error::CheckpointFormat { .. })));
    }

    #[test]
    fn test_status_liveness() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("status.json"));
        assert_eq!(store.status().unwrap(), CheckpointStatus::Absent);

        let alive = Checkpoint::started(std::process::id(), Utc::now(), HOUR);
        store.save(&alive).unwrap();
        assert_eq!(store.status().unwrap(), CheckpointStatus::Running(alive));

        let dead = Checkpoint::started(u32::MAX - 1, Utc::now(), HOUR);
        store.save(&dead).unwrap();
        assert_eq!(store.status().unwrap(), CheckpointStatus::Stale(dead));
    }
}
