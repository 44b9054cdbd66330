use std::io::Error as IoError;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("No paths provided. Use -p or -l")]
    NoPaths,
    #[error("No HTTP methods provided")]
    NoMethods,
    #[error("Error reading paths file {}: {source}", path.display())]
    PathList { path: PathBuf, source: IoError },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Probe(#[from] probeup::Error),
}
