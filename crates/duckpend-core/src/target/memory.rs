//! In-process target store.
//!
//! Tables live in memory; an append handle buffers rows until `commit`.
//! Useful for dry runs and for exercising sessions without a database.

use super::{AppendHandle, Column, TableRef, TableSchema, TargetStore};
use crate::value::{Row, Value};
use crate::TargetError;
use std::cell::RefCell;
use std::collections::HashMap;

type RejectFn = Box<dyn Fn(&[Value]) -> bool>;

#[derive(Default)]
struct MemoryState {
    tables: HashMap<TableRef, MemoryTable>,
    commits: usize,
    handles_opened: usize,
    handles_closed: usize,
}

struct MemoryTable {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

/// A target store whose tables are plain vectors.
#[derive(Default)]
pub struct MemoryTarget {
    state: RefCell<MemoryState>,
    reject: Option<RejectFn>,
    fail_commits: RefCell<usize>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table with the given `(name, data_type)` columns.
    pub fn with_table(self, schema: &str, table: &str, columns: &[(&str, &str)]) -> Self {
        self.state.borrow_mut().tables.insert(
            TableRef::new(schema, table),
            MemoryTable {
                columns: columns
                    .iter()
                    .map(|(name, data_type)| Column::new(*name, *data_type))
                    .collect(),
                rows: Vec::new(),
            },
        );
        self
    }

    /// Reject any appended row matching `predicate`.
    pub fn reject_rows_where(mut self, predicate: impl Fn(&[Value]) -> bool + 'static) -> Self {
        self.reject = Some(Box::new(predicate));
        self
    }

    /// Make the next `n` commits fail.
    pub fn fail_next_commits(&self, n: usize) {
        *self.fail_commits.borrow_mut() = n;
    }

    /// Committed rows of `table`, in append order.
    pub fn rows(&self, table: &TableRef) -> Vec<Row> {
        self.state
            .borrow()
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    pub fn row_count(&self, table: &TableRef) -> usize {
        self.state
            .borrow()
            .tables
            .get(table)
            .map_or(0, |t| t.rows.len())
    }

    pub fn commit_count(&self) -> usize {
        self.state.borrow().commits
    }

    pub fn open_count(&self) -> usize {
        self.state.borrow().handles_opened
    }

    pub fn close_count(&self) -> usize {
        self.state.borrow().handles_closed
    }
}

impl TargetStore for MemoryTarget {
    fn describe_table(&self, table: &TableRef) -> Result<Option<TableSchema>, TargetError> {
        Ok(self.state.borrow().tables.get(table).map(|t| TableSchema {
            table: table.clone(),
            columns: t.columns.clone(),
        }))
    }

    fn open_append_handle<'a>(
        &'a self,
        table: &TableRef,
    ) -> Result<Box<dyn AppendHandle + 'a>, TargetError> {
        let mut state = self.state.borrow_mut();
        let column_count = state
            .tables
            .get(table)
            .map(|t| t.columns.len())
            .ok_or_else(|| TargetError::TableNotFound(table.to_string()))?;
        state.handles_opened += 1;

        Ok(Box::new(MemoryAppendHandle {
            target: self,
            table: table.clone(),
            column_count,
            pending: Vec::new(),
        }))
    }
}

/// Append handle of a [`MemoryTarget`]. Rows become visible on commit.
pub struct MemoryAppendHandle<'a> {
    target: &'a MemoryTarget,
    table: TableRef,
    column_count: usize,
    pending: Vec<Row>,
}

impl AppendHandle for MemoryAppendHandle<'_> {
    fn append_row(&mut self, row: &[Value]) -> Result<(), TargetError> {
        if row.len() != self.column_count {
            return Err(TargetError::Rejected(format!(
                "expected {} values, got {}",
                self.column_count,
                row.len()
            )));
        }
        if let Some(reject) = &self.target.reject {
            if reject(row) {
                return Err(TargetError::Rejected(format!(
                    "row rejected by {}",
                    self.table
                )));
            }
        }
        self.pending.push(row.to_vec());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), TargetError> {
        {
            let mut failures = self.target.fail_commits.borrow_mut();
            if *failures > 0 {
                *failures -= 1;
                self.pending.clear();
                return Err(TargetError::Commit("injected commit failure".into()));
            }
        }

        let mut state = self.target.state.borrow_mut();
        let table = state
            .tables
            .get_mut(&self.table)
            .ok_or_else(|| TargetError::TableNotFound(self.table.to_string()))?;
        table.rows.append(&mut self.pending);
        state.commits += 1;
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<(), TargetError> {
        let result = if self.pending.is_empty() {
            Ok(())
        } else {
            self.commit()
        };
        self.target.state.borrow_mut().handles_closed += 1;
        result
    }
}
