//! duckpend core - memory-bounded buffered ingestion into DuckDB
//!
//! Rows handed to an [`Appender`] are parked in an off-heap staging medium
//! and pushed through the target store's native bulk-append handle in
//! batches, so process memory stays bounded no matter how many rows a
//! session ingests:
//!
//! - Row-at-a-time API with a configurable flush threshold
//! - SQLite or spill-file staging, or a caller-supplied medium
//! - Strict FIFO order into the target across flushes
//! - Scoped sessions that always close
//!
//! ```no_run
//! use duckpend_core::Appender;
//!
//! # fn main() -> duckpend_core::Result<()> {
//! let conn = duckdb::Connection::open_in_memory().map_err(duckpend_core::TargetError::from)?;
//! let mut appender = Appender::open(&conn, "main", "users")?;
//! appender.append_row([duckpend_core::Value::Integer(1), "John Doe".into()])?;
//! appender.close()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod staging;
pub mod target;
pub mod value;

/// Rows staged between automatic flushes unless configured otherwise.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 204_800;

// Re-export commonly used types
pub use config::Config;
pub use engine::{Appender, AppenderBuilder, FlushReport, SessionStats};
pub use error::{Error, Result};
pub use error::{StagingError, TargetError};
pub use staging::StagingMedium;
pub use target::{AppendHandle, MemoryTarget, TableRef, TableSchema, TargetStore};
pub use value::{Row, Value};
