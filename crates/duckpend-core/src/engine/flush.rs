//! Flush/commit engine.
//!
//! Drains the staging medium and forwards every drained row, in order,
//! through the target's append handle before committing. Rows of a failed
//! flush are neither guaranteed durable nor guaranteed absent; rows of
//! earlier successful flushes stay committed. There is no retry.

use crate::staging::StagingMedium;
use crate::target::AppendHandle;
use crate::{Error, Result};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Outcome of a flush that committed at least one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    pub rows: usize,
    pub duration: Duration,
}

/// Moves staged rows into the target store and keeps running totals.
#[derive(Debug, Default)]
pub struct FlushEngine {
    flushes: u64,
    rows_committed: u64,
    last_flush_duration: Option<Duration>,
}

impl FlushEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain `staging` into `handle` and commit.
    ///
    /// Returns `Ok(None)` without touching the handle when nothing is staged.
    pub fn flush(
        &mut self,
        staging: &mut dyn StagingMedium,
        handle: &mut dyn AppendHandle,
    ) -> Result<Option<FlushReport>> {
        let start = Instant::now();
        let rows = staging.drain_and_clear()?;

        if rows.is_empty() {
            debug!("Flush skipped, staging buffer is empty");
            return Ok(None);
        }

        for (index, row) in rows.iter().enumerate() {
            handle
                .append_row(row)
                .map_err(|source| Error::AppendRejected { index, source })?;
        }

        handle.commit()?;

        let report = FlushReport {
            rows: rows.len(),
            duration: start.elapsed(),
        };
        self.flushes += 1;
        self.rows_committed += report.rows as u64;
        self.last_flush_duration = Some(report.duration);

        info!(
            rows = %report.rows,
            duration_ms = %report.duration.as_millis(),
            flushes = self.flushes,
            "Staging buffer flushed"
        );

        Ok(Some(report))
    }

    /// Successful flushes so far.
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn rows_committed(&self) -> u64 {
        self.rows_committed
    }

    pub fn last_flush_duration(&self) -> Option<Duration> {
        self.last_flush_duration
    }
}
