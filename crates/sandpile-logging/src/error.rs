//! Logging setup errors

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while installing the global subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid filter directive {directive:?}: {message}")]
    InvalidFilter { directive: String, message: String },

    #[error("failed to open log output in {path}: {message}")]
    LogFile { path: PathBuf, message: String },

    #[error("a global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

pub type LoggingResult<T> = Result<T, LoggingError>;
