//! Error types for the duckpend core library.
//!
//! Uses hierarchical domain-specific errors following the thiserror pattern.

use thiserror::Error;

/// Result type alias for duckpend operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for duckpend.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The target schema/table could not be resolved
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Operation attempted on a closed session
    #[error("Appender session is closed")]
    ClosedSession,

    /// Row value count does not match the target column count
    #[error("Invalid number of columns: expected {expected}, got {actual}")]
    RowArity { expected: usize, actual: usize },

    /// Staging buffer used after it was released
    #[error("Staging buffer has been released")]
    ReleasedBuffer,

    /// Target store rejected a row during a flush
    #[error("Target store rejected row {index} of the flush batch: {source}")]
    AppendRejected {
        index: usize,
        #[source]
        source: TargetError,
    },

    /// Staging medium error
    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    /// Target store error
    #[error("Target store error: {0}")]
    Target(#[from] TargetError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Staging medium errors.
#[derive(Error, Debug)]
pub enum StagingError {
    /// Failed to create or open the backing storage
    #[error("Failed to open staging storage: {0}")]
    Open(String),

    /// Failed to insert a row
    #[error("Insert failed: {0}")]
    Insert(String),

    /// Failed to drain staged rows
    #[error("Drain failed: {0}")]
    Drain(String),

    /// Failed to discard the backing storage
    #[error("Release failed: {0}")]
    Release(String),

    /// A staged row could not be decoded
    #[error("Staged row corrupted at position {position}: {message}")]
    Corrupted { position: u64, message: String },
}

/// Target store errors.
#[derive(Error, Debug)]
pub enum TargetError {
    /// Table does not exist in the target store
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// Bulk-append primitive refused a row
    #[error("Row rejected: {0}")]
    Rejected(String),

    /// Commit of appended rows failed
    #[error("Commit failed: {0}")]
    Commit(String),

    /// Generic backend error
    #[error("{0}")]
    Backend(String),
}

// Conversion implementations for external error types

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<duckdb::Error> for TargetError {
    fn from(err: duckdb::Error) -> Self {
        TargetError::Backend(err.to_string())
    }
}
