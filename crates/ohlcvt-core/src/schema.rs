use rusqlite::{Row, Statement, params};

use crate::candle::{Candle, Source};
use crate::error::StoreError;

/// Column layout shared by every `<pair>_<interval>` table, in storage order.
pub const CANDLE_COLUMNS: [(&str, &str); 11] = [
    ("pair", "TEXT"),
    ("formatted_time", "TEXT"),
    ("timestamp", "INTEGER"),
    ("open", "REAL"),
    ("high", "REAL"),
    ("low", "REAL"),
    ("close", "REAL"),
    ("vwap", "REAL"),
    ("volume", "REAL"),
    ("count", "INTEGER"),
    ("source", "INTEGER"),
];

/// Table names are interpolated into SQL, so only `[A-Za-z0-9_]` is allowed.
pub fn validate_table_name(table: &str) -> Result<(), StoreError> {
    if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StoreError::InvalidTableName(table.to_string()));
    }
    Ok(())
}

fn quoted(table: &str) -> Result<String, StoreError> {
    validate_table_name(table)?;
    Ok(format!("\"{table}\""))
}

fn column_list() -> String {
    CANDLE_COLUMNS
        .iter()
        .map(|(name, _)| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn create_table_sql(table: &str) -> Result<String, StoreError> {
    let fields = CANDLE_COLUMNS
        .iter()
        .map(|(name, ty)| format!("\n\t\"{name}\" {ty}"))
        .collect::<Vec<_>>()
        .join(",");
    Ok(format!("CREATE TABLE IF NOT EXISTS {} ({fields}\n)", quoted(table)?))
}

/// One row per timestamp; appends use `INSERT OR IGNORE` against this index.
pub fn create_timestamp_index_sql(table: &str) -> Result<String, StoreError> {
    Ok(format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS \"{table}_timestamp\" ON {} (\"timestamp\")",
        quoted(table)?
    ))
}

pub fn drop_table_sql(table: &str) -> Result<String, StoreError> {
    Ok(format!("DROP TABLE IF EXISTS {}", quoted(table)?))
}

pub fn insert_sql(table: &str) -> Result<String, StoreError> {
    let placeholders = (1..=CANDLE_COLUMNS.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "INSERT OR IGNORE INTO {} ({}) VALUES ({placeholders})",
        quoted(table)?,
        column_list()
    ))
}

pub fn max_timestamp_sql(table: &str) -> Result<String, StoreError> {
    Ok(format!("SELECT MAX(\"timestamp\") FROM {}", quoted(table)?))
}

pub fn timestamp_span_sql(table: &str) -> Result<String, StoreError> {
    Ok(format!(
        "SELECT MIN(\"timestamp\"), MAX(\"timestamp\") FROM {}",
        quoted(table)?
    ))
}

pub fn count_sql(table: &str) -> Result<String, StoreError> {
    Ok(format!("SELECT COUNT(*) FROM {}", quoted(table)?))
}

/// Rows in insertion order.
pub fn select_sql(table: &str) -> Result<String, StoreError> {
    Ok(format!(
        "SELECT {} FROM {} ORDER BY rowid",
        column_list(),
        quoted(table)?
    ))
}

/// Executes a prepared [`insert_sql`] statement for one candle.
/// Returns 0 when the timestamp is already stored.
pub fn insert_candle(stmt: &mut Statement<'_>, candle: &Candle) -> rusqlite::Result<usize> {
    stmt.execute(params![
        candle.pair,
        candle.formatted_time(),
        candle.timestamp,
        candle.open,
        candle.high,
        candle.low,
        candle.close,
        candle.vwap,
        candle.volume,
        candle.count,
        candle.source.code(),
    ])
}

/// Inverse of [`insert_candle`] for a row produced by [`select_sql`].
/// `formatted_time` is derived, so it is skipped.
pub fn row_to_candle(row: &Row<'_>) -> rusqlite::Result<Candle> {
    let code: i64 = row.get(10)?;
    let source =
        Source::from_code(code).ok_or(rusqlite::Error::IntegralValueOutOfRange(10, code))?;

    Ok(Candle {
        pair: row.get(0)?,
        timestamp: row.get(2)?,
        open: row.get(3)?,
        high: row.get(4)?,
        low: row.get(5)?,
        close: row.get(6)?,
        vwap: row.get(7)?,
        volume: row.get(8)?,
        count: row.get(9)?,
        source,
    })
}
