//! Optional relational sink for the raw input.
//!
//! Bulk-loads the table exactly as read (before cleaning) into a SQLite
//! table, dropping and recreating it on every load. This is a side channel:
//! nothing downstream reads it back.

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};

use crate::error::{SinkError, SinkResult};
use crate::logs::RunLog;
use crate::models::{Cell, ColumnKind, Table};

/// Default destination table.
pub const DEFAULT_TABLE: &str = "customer_purchases";

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"));

/// Where the raw table is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// SQLite database file (created if absent).
    pub database: PathBuf,
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    DEFAULT_TABLE.to_string()
}

impl SinkConfig {
    pub fn new(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            table: default_table(),
        }
    }
}

/// Replace `config.table` with the contents of `table`. Returns rows written.
///
/// Runs in one transaction: on failure the previous contents stay in place.
pub fn ingest_raw(table: &Table, config: &SinkConfig, log: &RunLog) -> SinkResult<usize> {
    if !IDENTIFIER.is_match(&config.table) {
        return Err(SinkError::InvalidTableName(config.table.clone()));
    }
    let name = quote(&config.table);

    let mut conn = Connection::open(&config.database)?;
    let tx = conn.transaction()?;

    tx.execute(&format!("DROP TABLE IF EXISTS {}", name), [])?;

    let column_defs: Vec<String> = table
        .columns()
        .iter()
        .map(|c| {
            let sql_type = match c.kind {
                ColumnKind::Numeric => "REAL",
                ColumnKind::Text => "TEXT",
            };
            format!("{} {}", quote(&c.name), sql_type)
        })
        .collect();
    tx.execute(
        &format!("CREATE TABLE {} ({})", name, column_defs.join(", ")),
        [],
    )?;

    {
        let placeholders: Vec<String> = (1..=table.columns().len()).map(|i| format!("?{}", i)).collect();
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({})",
            name,
            placeholders.join(", ")
        ))?;
        for row in table.rows() {
            stmt.execute(params_from_iter(row.iter().map(to_sql)))?;
        }
    }
    tx.commit()?;

    log.success(format!(
        "Data successfully loaded into table {} ({} rows, {})",
        config.table,
        table.len(),
        config.database.display()
    ));
    Ok(table.len())
}

fn to_sql(cell: &Cell) -> SqlValue {
    match cell {
        Cell::Missing => SqlValue::Null,
        Cell::Number(v) => SqlValue::Real(*v),
        Cell::Text(s) => SqlValue::Text(s.clone()),
    }
}

/// Quote an identifier for SQLite.
fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
