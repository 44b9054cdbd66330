use std::{env, fmt, fs, io, path, time::Duration};

use probeup::{CheckpointStore, DEFAULT_CHECKPOINT_FILE, DEFAULT_TIMEOUT_SECONDS, ScheduleConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to parse config {}: {source}", path.display())]
    ParseFailed { path: path::PathBuf, source: toml::de::Error },
    #[error("config value `{0}` must be greater than zero")]
    ZeroValue(&'static str),
    #[error("config value `{name}` must be at most {max}")]
    TooLarge { name: &'static str, max: u64 },
}

/// Longest interval or duration accepted from a config file (ten years)
const MAX_SCHEDULE_SECS: u64 = 10 * 365 * 24 * 3600;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: Monitor,
    pub probe: Probe,
}

/// Keep An Eye mode settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitor {
    pub interval_minutes: u64,
    pub duration_hours: u64,
    pub checkpoint_file: path::PathBuf,
    pub log_file: path::PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Probe {
    pub timeout_seconds: u64,
}

impl Default for Monitor {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            duration_hours: 24,
            checkpoint_file: DEFAULT_CHECKPOINT_FILE.into(),
            log_file: ".firey.log".into(),
        }
    }
}

impl Default for Probe {
    fn default() -> Self {
        Self { timeout_seconds: DEFAULT_TIMEOUT_SECONDS }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().is_none() {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/firey/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Option<path::PathBuf> {
    let base = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else {
        env::home_dir()?.join(".config")
    };

    Some(base.join("firey/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Effective Configuration:")?;
        write_title_1(f, "Monitor")?;
        write_1(f, "Interval (minutes)", &self.monitor.interval_minutes)?;
        write_1(f, "Duration (hours)", &self.monitor.duration_hours)?;
        write_1(f, "Checkpoint File", &self.monitor.checkpoint_file.display())?;
        write_1(f, "Log File", &self.monitor.log_file.display())?;
        write_title_1(f, "Probe")?;
        write_1(f, "Timeout (seconds)", &self.probe.timeout_seconds)?;

        Ok(())
    }
}

impl Config {
    /// Load the configuration.
    ///
    /// An explicitly given file must exist. Otherwise the default location
    /// is used when present, and built-in defaults when not.
    pub fn load(explicit_path: Option<&path::Path>) -> Result<Self, ConfigError> {
        let config_path = match explicit_path {
            Some(path) => normalize_toml_path(path),
            None => match default_config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let raw_string = fs::read_to_string(&config_path)
            .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
        Self::parse(&raw_string)
            .map_err(|source| ConfigError::ParseFailed { path: config_path, source })?
            .validated()
    }

    fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.monitor.interval_minutes == 0 {
            return Err(ConfigError::ZeroValue("monitor.interval_minutes"));
        }
        if self.monitor.duration_hours == 0 {
            return Err(ConfigError::ZeroValue("monitor.duration_hours"));
        }
        if self.probe.timeout_seconds == 0 {
            return Err(ConfigError::ZeroValue("probe.timeout_seconds"));
        }

        check_max("monitor.interval_minutes", self.monitor.interval_minutes, 60)?;
        check_max("monitor.duration_hours", self.monitor.duration_hours, 3600)?;
        check_max("probe.timeout_seconds", self.probe.timeout_seconds, 1)?;
        Ok(self)
    }

    pub fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig::new(
            Duration::from_secs(self.monitor.interval_minutes.saturating_mul(60)),
            Duration::from_secs(self.monitor.duration_hours.saturating_mul(3600)),
        )
    }

    pub fn checkpoint_store(&self) -> CheckpointStore {
        CheckpointStore::new(&self.monitor.checkpoint_file)
    }
}

fn check_max(name: &'static str, value: u64, unit_secs: u64) -> Result<(), ConfigError> {
    let max = MAX_SCHEDULE_SECS / unit_secs;
    if value > max {
        return Err(ConfigError::TooLarge { name, max });
    }
    Ok(())
}
