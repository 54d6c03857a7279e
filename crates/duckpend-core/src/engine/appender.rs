//! Ingestion facade.
//!
//! An [`Appender`] accepts rows one at a time, parks them in a staging
//! medium and pushes them into the target store whenever the number of
//! pending rows reaches the flush threshold. Closing the session performs a
//! final flush, finalizes the append handle and releases the staging medium.

use super::flush::{FlushEngine, FlushReport};
use crate::config::{Config, StagingConfig};
use crate::staging::{self, StagingMedium};
use crate::target::{AppendHandle, TableRef, TableSchema, TargetStore};
use crate::value::{Row, Value};
use crate::{Error, Result, DEFAULT_FLUSH_THRESHOLD};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Counters for a single appender session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Rows accepted by `append_row`
    pub rows_appended: u64,
    /// Rows committed to the target store
    pub rows_committed: u64,
    /// Successful flushes
    pub flushes: u64,
    pub last_flush_duration: Option<Duration>,
}

/// Builder for an [`Appender`] session.
pub struct AppenderBuilder<'c> {
    store: &'c dyn TargetStore,
    table: TableRef,
    threshold: usize,
    staging: StagingConfig,
    staging_medium: Option<Box<dyn StagingMedium>>,
}

impl<'c> AppenderBuilder<'c> {
    /// Create a builder for `schema.table` on `store`.
    pub fn new(
        store: &'c dyn TargetStore,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            store,
            table: TableRef::new(schema, table),
            threshold: DEFAULT_FLUSH_THRESHOLD,
            staging: StagingConfig::default(),
            staging_medium: None,
        }
    }

    /// Number of pending rows that triggers a flush.
    pub fn threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    /// Staging medium settings.
    pub fn staging(mut self, staging: StagingConfig) -> Self {
        self.staging = staging;
        self
    }

    /// Take threshold and staging settings from a loaded configuration.
    pub fn config(mut self, config: &Config) -> Self {
        self.threshold = config.appender.threshold;
        self.staging = config.staging.clone();
        self
    }

    /// Use a caller-supplied staging medium instead of opening one.
    pub fn staging_medium(mut self, medium: Box<dyn StagingMedium>) -> Self {
        self.staging_medium = Some(medium);
        self
    }

    /// Resolve the target table and open the session.
    pub fn open(self) -> Result<Appender<'c>> {
        if self.threshold == 0 {
            return Err(Error::Config(
                "flush threshold must be greater than 0".into(),
            ));
        }

        let schema = self
            .store
            .describe_table(&self.table)?
            .filter(|s| s.column_count() > 0)
            .ok_or_else(|| {
                Error::InvalidTarget(format!(
                    "table {} does not exist or has no columns",
                    self.table
                ))
            })?;

        let staging = match self.staging_medium {
            Some(medium) => medium,
            None => staging::open(&self.staging)?,
        };

        let handle = self.store.open_append_handle(&self.table)?;

        info!(
            table = %self.table,
            columns = schema.column_count(),
            threshold = self.threshold,
            "Appender session opened"
        );

        Ok(Appender {
            store: self.store,
            schema,
            staging,
            handle: Some(handle),
            engine: FlushEngine::new(),
            pending: 0,
            threshold: self.threshold,
            rows_appended: 0,
            closed: false,
        })
    }
}

/// A buffered bulk-append session bound to one target table.
///
/// Dropping an open session closes it; errors raised while doing so are
/// logged rather than propagated. Call [`Appender::close`] to observe them.
pub struct Appender<'c> {
    store: &'c dyn TargetStore,
    schema: TableSchema,
    staging: Box<dyn StagingMedium>,
    handle: Option<Box<dyn AppendHandle + 'c>>,
    engine: FlushEngine,
    pending: usize,
    threshold: usize,
    rows_appended: u64,
    closed: bool,
}

impl<'c> Appender<'c> {
    /// Open a session with the default threshold and SQLite staging in the
    /// system temp directory.
    pub fn open(store: &'c dyn TargetStore, schema: &str, table: &str) -> Result<Self> {
        AppenderBuilder::new(store, schema, table).open()
    }

    pub fn builder(
        store: &'c dyn TargetStore,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> AppenderBuilder<'c> {
        AppenderBuilder::new(store, schema, table)
    }

    /// Open a session, run `body` against it and close it afterwards.
    ///
    /// The session is closed whether or not `body` succeeds. An error from
    /// `body` takes precedence over an error from closing.
    pub fn scoped<T, F>(builder: AppenderBuilder<'c>, body: F) -> Result<T>
    where
        F: FnOnce(&mut Appender<'c>) -> Result<T>,
    {
        let mut appender = builder.open()?;
        let result = body(&mut appender);
        let closed = appender.close();

        match result {
            Ok(value) => closed.map(|_| value),
            Err(e) => {
                if let Err(close_err) = closed {
                    warn!(error = %close_err, "Failed to close appender after error in scope");
                }
                Err(e)
            }
        }
    }

    /// Stage one row, flushing if the threshold is reached.
    pub fn append_row<I>(&mut self, row: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.ensure_open()?;

        let row: Row = row.into_iter().map(Into::into).collect();
        let expected = self.schema.column_count();
        if row.len() != expected {
            return Err(Error::RowArity {
                expected,
                actual: row.len(),
            });
        }

        self.staging.insert(&row)?;
        self.pending += 1;
        self.rows_appended += 1;

        if self.pending >= self.threshold {
            debug!(pending = self.pending, threshold = self.threshold, "Flush threshold reached");
            self.flush_staged()?;
        }

        Ok(())
    }

    /// Drain and commit everything staged so far.
    ///
    /// Returns `None` when nothing was staged.
    pub fn flush(&mut self) -> Result<Option<FlushReport>> {
        self.ensure_open()?;
        self.flush_staged()
    }

    /// Flush remaining rows, finalize the append handle and release the
    /// staging medium. Closing an already closed session does nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let flushed = self.flush_staged().map(|_| ());
        let handle_closed = match self.handle.take() {
            Some(handle) => handle.close().map_err(Error::from),
            None => Ok(()),
        };
        let released = self.staging.release();

        info!(
            table = %self.schema.table,
            rows_appended = self.rows_appended,
            rows_committed = self.engine.rows_committed(),
            flushes = self.engine.flushes(),
            "Appender session closed"
        );

        flushed.and(handle_closed).and(released)
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            rows_appended: self.rows_appended,
            rows_committed: self.engine.rows_committed(),
            flushes: self.engine.flushes(),
            last_flush_duration: self.engine.last_flush_duration(),
        }
    }

    /// Rows staged since the last successful flush.
    pub fn pending_rows(&self) -> usize {
        self.pending
    }

    /// Rows the staging medium currently holds.
    pub fn staged_rows(&self) -> Result<usize> {
        self.staging.pending_count()
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn table(&self) -> &TableRef {
        &self.schema.table
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::ClosedSession)
        } else {
            Ok(())
        }
    }

    fn flush_staged(&mut self) -> Result<Option<FlushReport>> {
        let mut handle = match self.handle.take() {
            Some(handle) => handle,
            None => {
                // Only reopen once there is something to write
                if self.staging.pending_count()? == 0 {
                    self.pending = 0;
                    return Ok(None);
                }
                self.store.open_append_handle(&self.schema.table)?
            }
        };

        match self.engine.flush(self.staging.as_mut(), handle.as_mut()) {
            Ok(report) => {
                self.handle = Some(handle);
                self.pending = 0;
                Ok(report)
            }
            Err(e) => {
                // The handle may hold part of the failed batch; a fresh one
                // is opened on the next flush
                drop(handle);
                self.pending = match self.staging.pending_count() {
                    Ok(count) => count,
                    Err(count_err) => {
                        warn!(
                            table = %self.schema.table,
                            error = %count_err,
                            "Failed to count staged rows after a failed flush"
                        );
                        0
                    }
                };
                warn!(
                    table = %self.schema.table,
                    error = %e,
                    pending = self.pending,
                    "Flush failed"
                );
                Err(e)
            }
        }
    }
}

impl Drop for Appender<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.close() {
            error!(table = %self.schema.table, error = %e, "Failed to close appender on drop");
        }
    }
}
