use std::env::var;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Where log lines go
#[derive(Debug, Clone)]
pub enum LogOutput {
    /// Standard error, for processes attached to a terminal
    Stderr,
    /// Append to a file, for detached processes without stdio
    File(PathBuf),
}

/// How chatty the default filter is; `RUST_LOG` always wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, silent: bool) -> Self {
        match (verbose, silent) {
            (_, true) => Verbosity::Quiet,
            (true, false) => Verbosity::Verbose,
            (false, false) => Verbosity::Normal,
        }
    }

    fn level(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::WARN,
            Verbosity::Normal => LevelFilter::INFO,
            Verbosity::Verbose => LevelFilter::DEBUG,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG_FORMAT=json` switches to JSON lines, anything else gives the
/// compact format. Fails only when the log file cannot be opened.
pub fn init(output: LogOutput, verbosity: Verbosity) -> io::Result<()> {
    let env_filter =
        EnvFilter::builder().with_default_directive(verbosity.level().into()).from_env_lossy();

    let json = var("RUST_LOG_FORMAT").is_ok_and(|format| format == "json");

    let log_layer = match output {
        LogOutput::Stderr => {
            let layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);
            if json {
                layer.json().with_filter(env_filter).boxed()
            } else {
                layer.compact().without_time().with_filter(env_filter).boxed()
            }
        }
        LogOutput::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let layer =
                tracing_subscriber::fmt::layer().with_writer(Mutex::new(file)).with_ansi(false);
            if json {
                layer.json().with_filter(env_filter).boxed()
            } else {
                layer.compact().with_filter(env_filter).boxed()
            }
        }
    };

    if tracing_subscriber::registry().with(log_layer).try_init().is_err() {
        warn!("Tracing subscriber already initialized, keeping the existing one");
    }

    Ok(())
}
