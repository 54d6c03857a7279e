//! SQLite-backed staging medium.
//!
//! Each medium owns a private database file holding a single
//! `staged_rows` table keyed by an autoincrement sequence. Inserts accumulate
//! in one open transaction; a drain reads and deletes inside that same
//! transaction and then commits, so the drained set and the cleared state
//! become visible together.

use super::{staging_file_path, StagingMedium};
use crate::config::StagingConfig;
use crate::value::{Row, Value};
use crate::{Error, Result, StagingError};
use rusqlite::{params, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CREATE_TABLE_SQL: &str = "CREATE TABLE staged_rows (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    payload TEXT NOT NULL
)";
const INSERT_SQL: &str = "INSERT INTO staged_rows (payload) VALUES (?1)";
const SELECT_SQL: &str = "SELECT seq, payload FROM staged_rows ORDER BY seq";

/// Staging medium backed by an embedded SQLite database file.
pub struct SqliteStaging {
    path: PathBuf,
    conn: Option<Connection>,
}

impl SqliteStaging {
    /// Create a fresh staging database under `config.dir`.
    pub fn create(config: &StagingConfig) -> Result<Self> {
        let path = staging_file_path(&config.dir, &config.file_prefix, "db");
        Self::create_at(path, config)
    }

    fn create_at(path: PathBuf, config: &StagingConfig) -> Result<Self> {
        let conn = Connection::open(&path).map_err(|e| {
            Error::Staging(StagingError::Open(format!(
                "Failed to open {}: {}",
                path.display(),
                e
            )))
        })?;

        let setup = format!(
            "PRAGMA synchronous = {};\nDROP TABLE IF EXISTS staged_rows;\n{};",
            config.sqlite_synchronous.as_pragma(),
            CREATE_TABLE_SQL
        );
        conn.execute_batch(&setup)
            .map_err(|e| Error::Staging(StagingError::Open(e.to_string())))?;

        debug!(path = %path.display(), "SQLite staging buffer created");

        Ok(Self {
            path,
            conn: Some(conn),
        })
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(Error::ReleasedBuffer)
    }
}

impl StagingMedium for SqliteStaging {
    fn insert(&mut self, row: &[Value]) -> Result<()> {
        let conn = self.conn()?;
        let payload = serde_json::to_string(row)?;

        if conn.is_autocommit() {
            conn.execute_batch("BEGIN")
                .map_err(|e| Error::Staging(StagingError::Insert(e.to_string())))?;
        }

        conn.prepare_cached(INSERT_SQL)
            .and_then(|mut stmt| stmt.execute(params![payload]))
            .map_err(|e| Error::Staging(StagingError::Insert(e.to_string())))?;

        Ok(())
    }

    fn drain_and_clear(&mut self) -> Result<Vec<Row>> {
        let conn = self.conn()?;
        let drain_err = |e: rusqlite::Error| Error::Staging(StagingError::Drain(e.to_string()));

        if conn.is_autocommit() {
            conn.execute_batch("BEGIN").map_err(drain_err)?;
        }

        let mut drained = Vec::new();
        {
            let mut stmt = conn.prepare_cached(SELECT_SQL).map_err(drain_err)?;
            let mut rows = stmt.query([]).map_err(drain_err)?;
            while let Some(record) = rows.next().map_err(drain_err)? {
                let seq: i64 = record.get(0).map_err(drain_err)?;
                let payload: String = record.get(1).map_err(drain_err)?;
                let row: Row = serde_json::from_str(&payload).map_err(|e| {
                    Error::Staging(StagingError::Corrupted {
                        position: seq as u64,
                        message: format!("JSON parse error: {}", e),
                    })
                })?;
                drained.push(row);
            }
        }

        conn.execute("DELETE FROM staged_rows", [])
            .map_err(drain_err)?;
        conn.execute_batch("COMMIT").map_err(drain_err)?;

        debug!(rows = drained.len(), "SQLite staging buffer drained");

        Ok(drained)
    }

    fn pending_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM staged_rows", [], |row| row.get(0))
            .map_err(|e| Error::Staging(StagingError::Drain(e.to_string())))?;
        Ok(count as usize)
    }

    fn release(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };

        conn.close()
            .map_err(|(_, e)| Error::Staging(StagingError::Release(e.to_string())))?;

        for path in [self.path.clone(), journal_path(&self.path)] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::Staging(StagingError::Release(format!(
                        "Failed to remove {}: {}",
                        path.display(),
                        e
                    ))))
                }
            }
        }

        debug!(path = %self.path.display(), "SQLite staging buffer released");
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.conn.is_none()
    }
}

impl Drop for SqliteStaging {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.path.display(), error = %e, "Failed to remove staging database");
        }
    }
}

fn journal_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push("-journal");
    PathBuf::from(name)
}
