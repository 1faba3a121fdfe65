//! Configuration for a simulator session
//!
//! ## Example config
//!
//! ```toml
//! host = "localhost"
//! port = 7236
//! auto_repaint = true
//! deadline_ms = 30000
//!
//! [layout]
//! scale = 10.0
//! offset_x = 0.0
//! offset_y = 0.0
//! ```
//!
//! Every key is optional; missing keys take the defaults above (no deadline,
//! identity layout).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sandpile_core::Layout;
use sandpile_wire::{DEFAULT_HOST, DEFAULT_PORT};

use crate::error::ConfigError;

/// Configuration for a [`GraphSession`](crate::GraphSession)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Simulator host
    pub host: String,
    /// Simulator port
    pub port: u16,
    /// Repaint after every successful mutation
    pub auto_repaint: bool,
    /// Local deadline per send/receive in milliseconds; `None` waits forever
    pub deadline_ms: Option<u64>,
    /// Transform applied to positions sent to the simulator
    pub layout: Layout,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            auto_repaint: true,
            deadline_ms: None,
            layout: Layout::default(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config = Self::parse(&contents, path.to_path_buf())?;
        tracing::info!(path = ?path, host = %config.host, port = config.port, "Loaded session config");
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Self::parse(contents, PathBuf::from("<inline>"))
    }

    fn parse(contents: &str, path: PathBuf) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse { path, source: e })
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_auto_repaint(mut self, enabled: bool) -> Self {
        self.auto_repaint = enabled;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline_ms = Some(deadline.as_millis() as u64);
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}
