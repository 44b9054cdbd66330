//! Background worker launch.
//!
//! Monitoring mode runs in a detached copy of the current executable. The
//! copy is told apart from the original invocation by the [`WORKER_MARKER`]
//! environment variable: without it the process is the original and spawns
//! a worker, with it the process is the worker and runs the schedule.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStatus, CheckpointStore};
use crate::{Error, Result};

/// Environment variable set to `1` in the spawned worker
pub const WORKER_MARKER: &str = "FIREY_BACKGROUND";

/// Which side of the launch handoff this process is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Invoked by the operator; must spawn the worker and return
    Original,
    /// Spawned worker; runs the schedule loop itself
    Worker,
}

impl Role {
    /// Determine the role from the process environment
    pub fn detect() -> Self {
        Self::from_marker(std::env::var_os(WORKER_MARKER).as_deref())
    }

    pub fn from_marker(marker: Option<&OsStr>) -> Self {
        match marker {
            Some(value) if value == "1" => Role::Worker,
            _ => Role::Original,
        }
    }
}

/// Detach a command from the launching terminal
trait DetachExt {
    fn detach(&mut self) -> &mut Self;
}

impl DetachExt for Command {
    fn detach(&mut self) -> &mut Self {
        self.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            self.process_group(0);
        }

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x0000_0008;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            self.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }

        self
    }
}

/// Program and arguments the worker is started with
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        Self { program: program.into(), args: args.into_iter().map(Into::into).collect() }
    }

    /// Re-invoke the running executable with `args`
    pub fn current_exe(args: impl IntoIterator<Item = impl Into<OsString>>) -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|source| Error::Spawn { program: PathBuf::from("<current executable>"), source })?;
        Ok(Self::new(program, args))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).env(WORKER_MARKER, "1").detach();
        command
    }
}

/// What the operator needs to know about a launched worker
#[derive(Debug, Clone)]
pub struct LaunchReport {
    pub pid: u32,
    pub checkpoint: Checkpoint,
    pub checkpoint_path: PathBuf,
}

/// Spawn the worker and record it in the checkpoint without waiting for it.
///
/// Failing to spawn is an error. Failing to write the initial checkpoint is
/// not: the worker rewrites it on its own.
pub fn launch_worker(
    command: &WorkerCommand,
    store: &CheckpointStore,
    interval: Duration,
) -> Result<LaunchReport> {
    match store.status() {
        Ok(CheckpointStatus::Running(existing)) => warn!(
            pid = existing.pid,
            "A monitor is already recorded as running, starting another one anyway"
        ),
        Ok(CheckpointStatus::Stale(existing)) => {
            info!(pid = existing.pid, "Replacing stale checkpoint of a dead monitor")
        }
        Ok(CheckpointStatus::Absent) => {}
        Err(e) => warn!("Ignoring unreadable checkpoint: {e}"),
    }

    let child = command
        .to_command()
        .spawn()
        .map_err(|source| Error::Spawn { program: command.program.clone(), source })?;
    let pid = child.id();
    // Dropping the handle neither waits for nor kills the worker
    drop(child);

    // The worker may already have written its own checkpoint. The window
    // between this load and the save below is not closed.
    let checkpoint = match own_checkpoint(store.load().ok().flatten(), pid) {
        Some(written) => {
            debug!(pid, iteration = written.iteration, "Worker already wrote its checkpoint");
            written
        }
        None => {
            let checkpoint = Checkpoint::started(pid, Utc::now(), interval);
            if let Err(e) = store.save(&checkpoint) {
                warn!("Failed to write initial checkpoint: {e}");
            }
            checkpoint
        }
    };

    info!(pid, checkpoint = %store.path().display(), "Background worker started");

    Ok(LaunchReport { pid, checkpoint, checkpoint_path: store.path().to_path_buf() })
}

/// The stored checkpoint, if it was written by the worker `pid` itself
fn own_checkpoint(existing: Option<Checkpoint>, pid: u32) -> Option<Checkpoint> {
    existing.filter(|checkpoint| checkpoint.pid == pid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const INTERVAL: Duration = Duration::from_secs(1800);

    #[test]
    fn test_role_from_marker() {
        assert_eq!(Role::from_marker(None), Role::Original);
        assert_eq!(Role::from_marker(Some(OsStr::new("0"))), Role::Original);
        assert_eq!(Role::from_marker(Some(OsStr::new("1"))), Role::Worker);
    }

    #[test]
    fn test_spawn_failure_is_fatal_and_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("status.json"));
        let command = WorkerCommand::new(dir.path().join("no-such-binary"), ["--kae"]);

        let err = launch_worker(&command, &store, INTERVAL).unwrap_err();

        assert!(matches!(err, Error::Spawn { .. }));
        assert!(!store.path().exists());
    }

    #[test]
    fn test_worker_checkpoint_is_not_overwritten() {
        let now = Utc::now();
        let mut written = Checkpoint::started(42, now, INTERVAL);
        written.advance(3, now, INTERVAL);

        assert_eq!(own_checkpoint(Some(written.clone()), 42), Some(written.clone()));
        assert_eq!(own_checkpoint(Some(written), 7), None);
        assert_eq!(own_checkpoint(None, 42), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_launch_writes_initial_checkpoint() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("status.json"));
        let command = WorkerCommand::new("true", Vec::<OsString>::new());

        let report = launch_worker(&command, &store, INTERVAL).unwrap();

        let saved = store.load().unwrap().unwrap();
        assert_eq!(saved.pid, report.pid);
        assert_eq!(saved.iteration, 0);
        assert_eq!(saved.next_check_time - saved.start_time, chrono::TimeDelta::minutes(30));
        assert_eq!(report.checkpoint_path, store.path());
    }

    #[cfg(unix)]
    #[test]
    fn test_worker_sees_marker() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("status.json"));
        let witness = dir.path().join("witness");
        let script = format!("echo \"${WORKER_MARKER}\" > '{}'", witness.display());
        let command = WorkerCommand::new("sh", ["-c", script.as_str()]);

        launch_worker(&command, &store, INTERVAL).unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        let contents = loop {
            match std::fs::read_to_string(&witness) {
                Ok(contents) if contents.ends_with('\n') => break contents,
                _ if std::time::Instant::now() > deadline => panic!("worker never ran"),
                _ => std::thread::sleep(Duration::from_millis(20)),
            }
        };
        assert_eq!(contents.trim(), "1");
    }
}
