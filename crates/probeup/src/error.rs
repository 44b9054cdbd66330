use std::io::Error as IoError;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no probe jobs to run: at least one path and one method are required")]
    NoJobs,

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to start background worker '{}': {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("checkpoint I/O error on {}: {source}", path.display())]
    CheckpointIo {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    #[error("malformed checkpoint {}: {source}", path.display())]
    CheckpointFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
