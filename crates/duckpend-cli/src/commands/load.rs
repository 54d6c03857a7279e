//! Load command implementation.
//!
//! Reads newline-delimited JSON and appends one row per line. Objects map
//! onto columns by name, with absent keys loaded as NULL; arrays map onto
//! columns by position. Nested arrays and objects are stored as JSON text.

use anyhow::{bail, Context, Result};
use duckdb::Connection;
use duckpend_core::target::TableSchema;
use duckpend_core::{Appender, Config, Row, SessionStats, Value};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use tracing::info;

/// Arguments of the load command.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub db: PathBuf,
    pub schema: String,
    pub table: String,
    pub threshold: Option<usize>,
    /// Read stdin when `None`
    pub input: Option<PathBuf>,
}

/// Run the load command.
pub fn run(config: &Config, options: LoadOptions) -> Result<()> {
    let conn = Connection::open(&options.db)
        .with_context(|| format!("Failed to open DuckDB database {}", options.db.display()))?;

    let reader: Box<dyn BufRead> = match &options.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let stats = load(&conn, config, &options, reader)?;

    println!(
        "Loaded {} rows into {}.{} ({} flushes)",
        stats.rows_committed, options.schema, options.table, stats.flushes
    );
    Ok(())
}

/// Append every line of `reader` to the target table.
///
/// Rows staged before a failing line are still flushed when the session is
/// dropped.
pub fn load<R: BufRead>(
    conn: &Connection,
    config: &Config,
    options: &LoadOptions,
    reader: R,
) -> Result<SessionStats> {
    let mut builder = Appender::builder(conn, options.schema.as_str(), options.table.as_str())
        .config(config);
    if let Some(threshold) = options.threshold {
        builder = builder.threshold(threshold);
    }

    let mut appender = builder
        .open()
        .with_context(|| format!("Failed to open appender on {}.{}", options.schema, options.table))?;
    let schema = appender.schema().clone();

    info!(
        table = %schema.table,
        threshold = appender.threshold(),
        "Loading rows"
    );

    for (index, line) in reader.lines().enumerate() {
        let line_num = index + 1;
        let line = line.with_context(|| format!("Failed to read line {}", line_num))?;
        if line.trim().is_empty() {
            continue;
        }

        let json: serde_json::Value = serde_json::from_str(&line)
            .with_context(|| format!("line {}: invalid JSON", line_num))?;
        let row = json_to_row(&json, &schema).with_context(|| format!("line {}", line_num))?;
        appender
            .append_row(row)
            .with_context(|| format!("line {}", line_num))?;
    }

    appender.close()?;
    Ok(appender.stats())
}

/// Convert one JSON document into a row for `schema`.
pub fn json_to_row(json: &serde_json::Value, schema: &TableSchema) -> Result<Row> {
    match json {
        serde_json::Value::Object(fields) => {
            if let Some(unknown) = fields.keys().find(|k| schema.position(k).is_none()) {
                bail!("unknown column {:?} for table {}", unknown, schema.table);
            }
            Ok(schema
                .column_names()
                .map(|name| fields.get(name).map_or(Value::Null, json_to_value))
                .collect())
        }
        serde_json::Value::Array(items) => Ok(items.iter().map(json_to_value).collect()),
        other => bail!("expected a JSON object or array, got {}", other),
    }
}

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map_or(Value::Null, Value::Float),
        },
        serde_json::Value::String(s) => Value::Text(s.clone()),
        nested @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
            Value::Text(nested.to_string())
        }
    }
}
