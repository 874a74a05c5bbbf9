//! Logging setup
//!
//! The runtime logs through `tracing`. Embedders that do not install their
//! own subscriber can call [`init_logging`] once at startup. `RUST_LOG` is
//! honoured on top of the configured level and filter directives.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable output
    Pretty,
    /// One line per event
    Compact,
    /// One JSON object per event
    Json,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level
    pub level: Level,
    /// Output format
    pub format: LogFormat,
    /// Extra filter directives, e.g. `qom_engine=trace`
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the output format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set extra filter directives
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    fn build_filter(&self) -> Result<EnvFilter, LogInitError> {
        let mut filter = EnvFilter::from_default_env().add_directive(self.level.into());
        if let Some(directives) = &self.filter {
            for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
                let parsed = directive
                    .trim()
                    .parse()
                    .map_err(|_| LogInitError::InvalidDirective(directive.to_string()))?;
                filter = filter.add_directive(parsed);
            }
        }
        Ok(filter)
    }
}

/// Logging initialization errors
#[derive(Debug, thiserror::Error)]
pub enum LogInitError {
    /// A filter directive could not be parsed
    #[error("Invalid filter directive: {0}")]
    InvalidDirective(String),

    /// A global subscriber is already installed
    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Install a global subscriber writing to stderr
pub fn init_logging(config: &LogConfig) -> Result<(), LogInitError> {
    let filter = config.build_filter()?;
    let registry = tracing_subscriber::registry().with(filter);
    let layer = fmt::layer().with_writer(std::io::stderr);

    let result = match config.format {
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
    result.map_err(|e| LogInitError::AlreadyInitialized(e.to_string()))
}

/// Debug-level logging for the runtime, compact format
pub fn init_dev_logging() -> Result<(), LogInitError> {
    init_logging(
        &LogConfig::new()
            .with_level(Level::DEBUG)
            .with_filter("qom_engine=trace"),
    )
}
