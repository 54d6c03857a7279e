//! Describe command implementation.

use anyhow::{bail, Context, Result};
use duckdb::Connection;
use duckpend_core::{TableRef, TargetStore};
use std::path::Path;

/// Print the columns of `schema.table` in declaration order.
pub fn run(db: &Path, schema: &str, table: &str) -> Result<()> {
    let conn = Connection::open(db)
        .with_context(|| format!("Failed to open DuckDB database {}", db.display()))?;

    let table = TableRef::new(schema, table);
    let Some(resolved) = conn.describe_table(&table)? else {
        bail!("table {} not found in {}", table, db.display());
    };

    println!("{}", table);
    for (position, column) in resolved.columns.iter().enumerate() {
        println!("  {:>3}  {:<32} {}", position + 1, column.name, column.data_type);
    }

    Ok(())
}
