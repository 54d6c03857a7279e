//! DuckDB target store.
//!
//! Column metadata comes from `information_schema.columns`; rows go through
//! DuckDB's native appender, whose `flush` is the commit point. DuckDB casts
//! each appended value to the column's declared type. Lists are bound as
//! DuckDB list literals and cast into LIST or ARRAY columns.

use super::{AppendHandle, Column, TableRef, TableSchema, TargetStore};
use crate::value::Value;
use crate::TargetError;
use ::duckdb::types::{TimeUnit, Value as DuckValue};
use ::duckdb::{appender_params_from_iter, params, Appender, Connection};
use chrono::Datelike;
use tracing::debug;

const DESCRIBE_SQL: &str = "SELECT column_name, data_type
    FROM information_schema.columns
    WHERE table_schema = ? AND table_name = ?
    ORDER BY ordinal_position";

/// Days from 0001-01-01 to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

impl TargetStore for Connection {
    fn describe_table(&self, table: &TableRef) -> Result<Option<TableSchema>, TargetError> {
        let mut stmt = self.prepare(DESCRIBE_SQL)?;
        let columns = stmt
            .query_map(params![table.schema, table.table], |row| {
                Ok(Column {
                    name: row.get(0)?,
                    data_type: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Ok(None);
        }

        debug!(table = %table, columns = columns.len(), "Resolved DuckDB table schema");

        Ok(Some(TableSchema {
            table: table.clone(),
            columns,
        }))
    }

    fn open_append_handle<'a>(
        &'a self,
        table: &TableRef,
    ) -> Result<Box<dyn AppendHandle + 'a>, TargetError> {
        let appender = self
            .appender_to_db(&table.table, &table.schema)
            .map_err(|e| TargetError::TableNotFound(format!("{}: {}", table, e)))?;

        Ok(Box::new(DuckDbAppendHandle { appender }))
    }
}

/// Append handle wrapping a DuckDB appender.
struct DuckDbAppendHandle<'conn> {
    appender: Appender<'conn>,
}

impl AppendHandle for DuckDbAppendHandle<'_> {
    fn append_row(&mut self, row: &[Value]) -> Result<(), TargetError> {
        let values = row.iter().map(to_duckdb_value);
        self.appender
            .append_row(appender_params_from_iter(values))
            .map_err(|e| TargetError::Rejected(e.to_string()))
    }

    fn commit(&mut self) -> Result<(), TargetError> {
        self.appender
            .flush()
            .map_err(|e| TargetError::Commit(e.to_string()))
    }

    fn close(self: Box<Self>) -> Result<(), TargetError> {
        let mut handle = *self;
        handle
            .appender
            .flush()
            .map_err(|e| TargetError::Commit(e.to_string()))
        // Dropping the appender destroys it
    }
}

fn to_duckdb_value(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Boolean(b) => DuckValue::Boolean(*b),
        Value::Integer(i) => DuckValue::BigInt(*i),
        Value::Float(x) => DuckValue::Double(*x),
        Value::Text(s) => DuckValue::Text(s.clone()),
        Value::Blob(b) => DuckValue::Blob(b.clone()),
        Value::Timestamp(ts) => DuckValue::Timestamp(TimeUnit::Microsecond, ts.timestamp_micros()),
        Value::Date(d) => DuckValue::Date32(d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
        Value::Uuid(u) => DuckValue::Text(u.hyphenated().to_string()),
        Value::List(items) => DuckValue::Text(list_literal(items)),
    }
}

/// Render `items` as a DuckDB list literal such as `["a1", "b2", NULL]`.
fn list_literal(items: &[Value]) -> String {
    let mut out = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match item {
            Value::Null => out.push_str("NULL"),
            Value::Boolean(_) | Value::Integer(_) | Value::Float(_) => {
                out.push_str(&item.to_string())
            }
            Value::List(nested) => out.push_str(&list_literal(nested)),
            Value::Blob(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("\\x{:02X}", b)).collect();
                push_quoted(&mut out, &hex);
            }
            Value::Timestamp(ts) => {
                push_quoted(&mut out, &ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
            }
            Value::Text(_) | Value::Date(_) | Value::Uuid(_) => {
                push_quoted(&mut out, &item.to_string())
            }
        }
    }
    out.push(']');
    out
}

fn push_quoted(out: &mut String, text: &str) {
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}
