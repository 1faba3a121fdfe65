//! Error types for the label-space session

use std::path::PathBuf;

use thiserror::Error;

use sandpile_core::DirectoryError;
use sandpile_wire::WireError;

/// Errors that can occur in a session
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport or server-side failure
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// Label translation failure (stale or foreign label)
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
