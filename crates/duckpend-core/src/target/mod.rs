//! Target store contract.
//!
//! The pipeline relies on two things from the analytical store it feeds:
//! column metadata for a schema-qualified table, and a native bulk-append
//! handle with append-one-row / commit / close operations.
//!
//! ## Implementations
//!
//! - `duckdb::Connection` - DuckDB's native appender
//! - [`MemoryTarget`] - in-process tables, for tests and dry runs

mod duckdb;
mod memory;

pub use memory::{MemoryAppendHandle, MemoryTarget};

use crate::value::Value;
use crate::TargetError;
use std::fmt;

/// Schema-qualified table name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// A column of the target table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub data_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Resolved column metadata for a target table, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: TableRef,
    pub columns: Vec<Column>,
}

impl TableSchema {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Position of a column by name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// A store that can receive bulk-appended rows.
pub trait TargetStore {
    /// Column metadata for `table`, or `None` if the store cannot resolve it.
    fn describe_table(&self, table: &TableRef) -> Result<Option<TableSchema>, TargetError>;

    /// Open a native bulk-append handle bound to `table`.
    fn open_append_handle<'a>(
        &'a self,
        table: &TableRef,
    ) -> Result<Box<dyn AppendHandle + 'a>, TargetError>;
}

/// Statement-free row ingestion handle.
pub trait AppendHandle {
    /// Append one row, values in column order.
    fn append_row(&mut self, row: &[Value]) -> Result<(), TargetError>;

    /// Make every row appended so far durable in the store.
    fn commit(&mut self) -> Result<(), TargetError>;

    /// Finalize and release the handle.
    fn close(self: Box<Self>) -> Result<(), TargetError>;
}
