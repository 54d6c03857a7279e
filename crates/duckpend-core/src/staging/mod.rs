//! Off-heap staging buffer for rows awaiting a flush.
//!
//! Rows appended to a session are parked in a staging medium instead of an
//! in-process list, so memory use is bounded by disk rather than by the
//! number of rows accumulated since the last flush.
//!
//! ## Media
//!
//! - [`SqliteStaging`] - embedded SQLite database file (default)
//! - [`SpillFileStaging`] - append-only JSON-lines spill file
//!
//! Any type implementing [`StagingMedium`] can be injected into a session.

mod spill;
mod sqlite;

pub use spill::SpillFileStaging;
pub use sqlite::SqliteStaging;

use crate::config::{StagingBackend, StagingConfig};
use crate::value::{Row, Value};
use crate::Result;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Insert / drain-in-order / clear contract of a staging medium.
pub trait StagingMedium {
    /// Append a row at the tail. Must not load previously staged rows.
    fn insert(&mut self, row: &[Value]) -> Result<()>;

    /// Return every staged row in insertion order and empty the medium in
    /// one step. A later call never observes rows returned here.
    fn drain_and_clear(&mut self) -> Result<Vec<Row>>;

    /// Number of rows currently staged.
    fn pending_count(&self) -> Result<usize>;

    /// Discard the backing storage. Idempotent.
    fn release(&mut self) -> Result<()>;

    fn is_released(&self) -> bool;
}

/// Open the staging medium selected by `config`.
pub fn open(config: &StagingConfig) -> Result<Box<dyn StagingMedium>> {
    match config.backend {
        StagingBackend::Sqlite => Ok(Box::new(SqliteStaging::create(config)?)),
        StagingBackend::Spill => Ok(Box::new(SpillFileStaging::create(config)?)),
    }
}

/// Unique staging file path under the configured directory.
fn staging_file_path(dir: &Path, prefix: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}_{}.{}", prefix, Uuid::new_v4().simple(), extension))
}
