//! Configuration structures for duckpend.
//!
//! Configuration is loaded from TOML files and can be overridden via CLI flags
//! or the [`AppenderBuilder`](crate::engine::AppenderBuilder).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Appender session configuration
    #[serde(default)]
    pub appender: AppenderConfig,

    /// Staging medium configuration
    #[serde(default)]
    pub staging: StagingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Appender session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppenderConfig {
    /// Number of appended rows between automatic flushes
    #[serde(default = "default_threshold")]
    pub threshold: usize,
}

impl Default for AppenderConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

/// Staging medium configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StagingConfig {
    /// Which staging medium backs the buffer
    #[serde(default)]
    pub backend: StagingBackend,

    /// Directory holding staging files
    #[serde(default = "default_staging_dir")]
    pub dir: PathBuf,

    /// File name prefix for staging files
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// SQLite `synchronous` pragma for the sqlite backend
    #[serde(default)]
    pub sqlite_synchronous: SqliteSynchronous,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            backend: StagingBackend::default(),
            dir: default_staging_dir(),
            file_prefix: default_file_prefix(),
            sqlite_synchronous: SqliteSynchronous::default(),
        }
    }
}

/// Staging medium backend.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StagingBackend {
    /// Embedded SQLite database file (default)
    #[default]
    Sqlite,
    /// Append-only JSON-lines spill file
    Spill,
}

/// SQLite `synchronous` pragma value.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SqliteSynchronous {
    /// No fsync; the buffer does not need to survive a crash
    #[default]
    Off,
    /// Sync at critical moments
    Normal,
    /// Sync on every commit
    Full,
}

impl SqliteSynchronous {
    /// Pragma keyword for this setting.
    pub fn as_pragma(&self) -> &'static str {
        match self {
            SqliteSynchronous::Off => "OFF",
            SqliteSynchronous::Normal => "NORMAL",
            SqliteSynchronous::Full => "FULL",
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Log format
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl LogLevel {
    /// Filter directive for this level.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Plain text format
    Text,
}

// Default value functions
fn default_threshold() -> usize {
    crate::DEFAULT_FLUSH_THRESHOLD
}
fn default_staging_dir() -> PathBuf {
    std::env::temp_dir()
}
fn default_file_prefix() -> String {
    "duckpend_buffer".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.appender.threshold == 0 {
            return Err(crate::Error::Config(
                "Flush threshold must be a positive row count".into(),
            ));
        }

        if self.staging.file_prefix.is_empty() {
            return Err(crate::Error::Config(
                "Staging file prefix is required".into(),
            ));
        }

        if self.staging.backend == StagingBackend::Sqlite
            && self.staging.sqlite_synchronous == SqliteSynchronous::Full
        {
            tracing::warn!("Full fsync on the staging buffer slows every flush");
        }

        Ok(())
    }
}
