//! Append-only spill file staging medium.
//!
//! Rows are written as JSON lines through a buffered writer. A drain flushes
//! the writer, replays the file from the start and truncates it.

use super::{staging_file_path, StagingMedium};
use crate::config::StagingConfig;
use crate::value::{Row, Value};
use crate::{Error, Result, StagingError};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Staging medium backed by a JSON-lines spill file.
pub struct SpillFileStaging {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    staged: usize,
}

impl SpillFileStaging {
    /// Create a fresh spill file under `config.dir`.
    pub fn create(config: &StagingConfig) -> Result<Self> {
        let path = staging_file_path(&config.dir, &config.file_prefix, "jsonl");

        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                Error::Staging(StagingError::Open(format!(
                    "Failed to open {}: {}",
                    path.display(),
                    e
                )))
            })?;

        debug!(path = %path.display(), "Spill file staging buffer created");

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            staged: 0,
        })
    }

    /// Path of the backing spill file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.writer.as_mut().ok_or(Error::ReleasedBuffer)
    }
}

impl StagingMedium for SpillFileStaging {
    fn insert(&mut self, row: &[Value]) -> Result<()> {
        let line = serde_json::to_string(row)?;
        let writer = self.writer()?;
        writeln!(writer, "{}", line)
            .map_err(|e| Error::Staging(StagingError::Insert(e.to_string())))?;
        self.staged += 1;
        Ok(())
    }

    fn drain_and_clear(&mut self) -> Result<Vec<Row>> {
        let path = self.path.clone();
        let writer = self.writer()?;
        writer
            .flush()
            .map_err(|e| Error::Staging(StagingError::Drain(e.to_string())))?;

        let file = File::open(&path)
            .map_err(|e| Error::Staging(StagingError::Drain(e.to_string())))?;
        let reader = BufReader::new(file);

        let mut drained = Vec::with_capacity(self.staged);
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| {
                Error::Staging(StagingError::Corrupted {
                    position: line_num as u64,
                    message: e.to_string(),
                })
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let row: Row = serde_json::from_str(&line).map_err(|e| {
                Error::Staging(StagingError::Corrupted {
                    position: line_num as u64,
                    message: format!("JSON parse error: {}", e),
                })
            })?;
            drained.push(row);
        }

        // Rewind to an empty file; the writer is flushed so nothing is lost
        let writer = self.writer()?;
        let file = writer.get_mut();
        file.set_len(0)
            .and_then(|_| std::io::Seek::rewind(file))
            .map_err(|e| Error::Staging(StagingError::Drain(e.to_string())))?;
        self.staged = 0;

        debug!(rows = drained.len(), "Spill file staging buffer drained");

        Ok(drained)
    }

    fn pending_count(&self) -> Result<usize> {
        if self.writer.is_none() {
            return Err(Error::ReleasedBuffer);
        }
        Ok(self.staged)
    }

    fn release(&mut self) -> Result<()> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        drop(writer);

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(Error::Staging(StagingError::Release(format!(
                    "Failed to remove {}: {}",
                    self.path.display(),
                    e
                ))))
            }
        }
        self.staged = 0;

        debug!(path = %self.path.display(), "Spill file staging buffer released");
        Ok(())
    }

    fn is_released(&self) -> bool {
        self.writer.is_none()
    }
}

impl Drop for SpillFileStaging {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.path.display(), error = %e, "Failed to remove spill file");
        }
    }
}
