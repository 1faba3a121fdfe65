//! Where a simulator client's log events go

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Logging configuration for a client process
///
/// Every field has a default, so a partial `[logging]` table in a session's
/// TOML file deserializes cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub filter: String,
    pub console: ConsoleOutput,
    /// Write console output through libtest's captured writer
    pub capture: bool,
    /// Append JSON lines to a log file as well
    pub file: Option<FileOutput>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            console: ConsoleOutput::Json,
            capture: false,
            file: None,
        }
    }
}

impl LogConfig {
    /// Pretty console output showing every command sent and reply received
    pub fn interactive() -> Self {
        Self {
            filter: "info,sandpile_wire=debug".to_string(),
            console: ConsoleOutput::Pretty,
            ..Default::default()
        }
    }

    /// Session history kept in daily files, nothing on the console
    pub fn archive(directory: impl Into<PathBuf>) -> Self {
        Self {
            filter: "debug".to_string(),
            console: ConsoleOutput::Off,
            capture: false,
            file: Some(FileOutput {
                directory: directory.into(),
                ..FileOutput::default()
            }),
        }
    }

    /// Warnings only (rejected commands, reconnects), captured per test
    pub fn testing() -> Self {
        Self {
            filter: "warn".to_string(),
            console: ConsoleOutput::Pretty,
            capture: true,
            file: None,
        }
    }
}

/// Console format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConsoleOutput {
    Off,
    Pretty,
    #[default]
    Json,
}

/// Log file location and rotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutput {
    pub directory: PathBuf,
    /// File name prefix; files are named `<prefix>.log` or `<prefix>.<date>.log`
    pub prefix: String,
    pub rotation: RotationStrategy,
    /// Rotated files to retain
    pub keep: Option<usize>,
}

impl Default for FileOutput {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "sandpile".to_string(),
            rotation: RotationStrategy::Daily,
            keep: Some(7),
        }
    }
}

/// File rotation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    /// Single file, truncated on startup
    Never,
}
