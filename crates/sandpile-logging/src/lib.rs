//! Structured logging for sandpile simulator clients
//!
//! Every crate in the workspace logs through `tracing`; this crate installs
//! the subscriber that decides where those events go.
//!
//! # Features
//!
//! - **JSONL Output**: structured JSON lines on the console (default) and in files
//! - **Pretty Console**: human-readable output for interactive sessions
//! - **File Rotation**: daily or hourly rotation via tracing-appender
//!
//! # Quick Start
//!
//! ```ignore
//! use sandpile_logging::{LogConfig, SandpileSubscriberBuilder};
//!
//! // JSONL to the console
//! let _guard = SandpileSubscriberBuilder::new().init();
//!
//! // Pretty output including every command and reply
//! let _guard = SandpileSubscriberBuilder::new()
//!     .with_config(LogConfig::interactive())
//!     .init();
//! ```
//!
//! Keep the returned guard alive while file output is in use; dropping it
//! flushes pending lines.

pub mod config;
pub mod error;

pub use config::{ConsoleOutput, FileOutput, LogConfig, RotationStrategy};
pub use error::{LoggingError, LoggingResult};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, MakeWriter, TestWriter};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type Base = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<Base> + Send + Sync>;

/// The subscriber assembled by [`SandpileSubscriberBuilder::build`]
pub type SandpileSubscriber = Layered<Vec<BoxedLayer>, Base>;

/// Builder for configuring and installing the logging subscriber
///
/// Console output defaults to JSONL. Use [`LogConfig::interactive`] for
/// human-readable output.
pub struct SandpileSubscriberBuilder {
    config: LogConfig,
}

impl SandpileSubscriberBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the filter directive used when `RUST_LOG` is unset
    pub fn with_filter(mut self, directive: impl Into<String>) -> Self {
        self.config.filter = directive.into();
        self
    }

    pub fn with_console(mut self, console: ConsoleOutput) -> Self {
        self.config.console = console;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileOutput) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Assemble the subscriber without installing it
    ///
    /// Useful with `tracing::subscriber::with_default` for scoped capture.
    pub fn build(self) -> LoggingResult<(SandpileSubscriber, Option<WorkerGuard>)> {
        // The configured directive is validated even when RUST_LOG wins
        let fallback = parse_filter(&self.config.filter)?;
        let env_filter = EnvFilter::try_from_default_env().unwrap_or(fallback);

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if let Some(layer) = self.console_layer() {
            layers.push(layer);
        }
        if let Some(file_config) = &self.config.file {
            let (writer, file_guard) = file_writer(file_config)?;
            layers.push(json_layer(writer));
            guard = Some(file_guard);
        }

        let subscriber = Registry::default().with(env_filter).with(layers);
        Ok((subscriber, guard))
    }

    /// Install the subscriber globally
    ///
    /// Fails if the configuration is invalid or a global subscriber is
    /// already set.
    pub fn try_init(self) -> LoggingResult<Option<WorkerGuard>> {
        let (subscriber, guard) = self.build()?;
        subscriber
            .try_init()
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        Ok(guard)
    }

    /// Install the subscriber globally, reporting failures on stderr
    pub fn init(self) -> Option<WorkerGuard> {
        match self.try_init() {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging: {}", e);
                None
            }
        }
    }

    fn console_layer(&self) -> Option<BoxedLayer> {
        let capture = self.config.capture;
        let layer = match (self.config.console, capture) {
            (ConsoleOutput::Off, _) => return None,
            (ConsoleOutput::Pretty, true) => text_layer(false, TestWriter::new()),
            (ConsoleOutput::Pretty, false) => text_layer(true, std::io::stdout),
            (ConsoleOutput::Json, true) => json_layer(TestWriter::new()),
            (ConsoleOutput::Json, false) => json_layer(std::io::stdout),
        };
        Some(layer)
    }
}

impl Default for SandpileSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_filter(directive: &str) -> LoggingResult<EnvFilter> {
    EnvFilter::try_new(directive).map_err(|e| LoggingError::InvalidFilter {
        directive: directive.to_string(),
        message: e.to_string(),
    })
}

fn text_layer<W>(ansi: bool, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_ansi(ansi)
        .with_target(true)
        .with_writer(writer)
        .boxed()
}

/// One flat JSON object per event, with the enclosing session spans
fn json_layer<W>(writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_writer(writer)
        .boxed()
}

/// Open the file sink; `Never` truncates a single file, the others append
/// to rolling files
fn file_writer(config: &FileOutput) -> LoggingResult<(NonBlocking, WorkerGuard)> {
    let file_error = |e: &dyn std::fmt::Display| LoggingError::LogFile {
        path: config.directory.clone(),
        message: e.to_string(),
    };

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            fs::create_dir_all(&config.directory).map_err(|e| file_error(&e))?;
            let path = config.directory.join(format!("{}.log", config.prefix));
            let file = File::create(&path).map_err(|e| file_error(&e))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(config.prefix.clone())
        .filename_suffix("log");
    if let Some(keep) = config.keep {
        builder = builder.max_log_files(keep);
    }
    let appender = builder
        .build(&config.directory)
        .map_err(|e| file_error(&e))?;
    Ok(tracing_appender::non_blocking(appender))
}

/// Initialize logging with default settings (JSONL to console)
pub fn init_default() -> Option<WorkerGuard> {
    SandpileSubscriberBuilder::new().init()
}

/// Initialize pretty console logging that shows wire traffic
pub fn init_interactive() -> Option<WorkerGuard> {
    SandpileSubscriberBuilder::new()
        .with_config(LogConfig::interactive())
        .init()
}

/// Initialize logging for tests; repeated calls are ignored
pub fn init_testing() {
    let _ = SandpileSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creation() {
        let builder = SandpileSubscriberBuilder::new();
        assert_eq!(builder.config().filter, "info");
        assert_eq!(builder.config().console, ConsoleOutput::Json);
    }

    #[test]
    fn test_builder_with_config() {
        let builder = SandpileSubscriberBuilder::new().with_config(LogConfig::interactive());
        assert_eq!(builder.config().console, ConsoleOutput::Pretty);
    }

    #[test]
    fn test_builder_overrides() {
        let builder = SandpileSubscriberBuilder::new()
            .with_filter("sandpile_session=trace")
            .with_console(ConsoleOutput::Off);
        assert_eq!(builder.config().filter, "sandpile_session=trace");
        assert_eq!(builder.config().console, ConsoleOutput::Off);
    }

    #[test]
    fn test_invalid_filter() {
        let result = SandpileSubscriberBuilder::new()
            .with_config(LogConfig::testing())
            .with_filter("sandpile=loudest")
            .build();
        assert!(matches!(result, Err(LoggingError::InvalidFilter { .. })));
    }
}
