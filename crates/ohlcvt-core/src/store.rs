use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, OptionalExtension};
use tracing::debug;

use crate::candle::Candle;
use crate::error::StoreError;
use crate::schema;

/// Watermark for a table with no rows: 2000-01-01 00:00:00 UTC.
pub const DEFAULT_WATERMARK: i64 = 946_684_800;

/// SQLite-backed store holding one table per (pair, interval).
///
/// Every operation opens its own connection and closes it before returning.
/// Read-only operations never create the database file.
pub struct CandleStore {
    db_path: PathBuf,
}

impl CandleStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Whether the database file exists yet.
    pub fn exists(&self) -> bool {
        self.db_path.exists()
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Connection::open(&self.db_path)?)
    }

    fn connect_read_only(&self) -> Result<Option<Connection>, StoreError> {
        if !self.exists() {
            return Ok(None);
        }
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Some(conn))
    }

    /// Create the candle table (and its timestamp index) if absent.
    pub fn create_table(&self, table: &str) -> Result<(), StoreError> {
        let create = schema::create_table_sql(table)?;
        let index = schema::create_timestamp_index_sql(table)?;
        let conn = self.connect()?;
        conn.execute(&create, [])?;
        conn.execute(&index, [])?;
        debug!("{table}: table ready");
        Ok(())
    }

    /// Drop the table if it exists.
    pub fn drop_table(&self, table: &str) -> Result<(), StoreError> {
        let sql = schema::drop_table_sql(table)?;
        let conn = self.connect()?;
        conn.execute(&sql, [])?;
        debug!("{table}: table dropped");
        Ok(())
    }

    pub fn table_exists(&self, table: &str) -> Result<bool, StoreError> {
        schema::validate_table_name(table)?;
        let Some(conn) = self.connect_read_only()? else {
            return Ok(false);
        };
        table_exists(&conn, table)
    }

    /// Largest stored `timestamp`, or [`DEFAULT_WATERMARK`] when the table is
    /// empty or missing.
    pub fn max_timestamp(&self, table: &str) -> Result<i64, StoreError> {
        let sql = schema::max_timestamp_sql(table)?;
        let Some(conn) = self.connect_read_only()? else {
            return Ok(DEFAULT_WATERMARK);
        };
        if !table_exists(&conn, table)? {
            return Ok(DEFAULT_WATERMARK);
        }
        let max: Option<i64> = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(max.unwrap_or(DEFAULT_WATERMARK))
    }

    /// Append candles in order within one transaction.
    /// Rows whose timestamp is already stored are skipped.
    /// Returns the number of rows actually inserted.
    pub fn append(&self, table: &str, candles: &[Candle]) -> Result<usize, StoreError> {
        if candles.is_empty() {
            return Ok(0);
        }
        let sql = schema::insert_sql(table)?;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for candle in candles {
                inserted += schema::insert_candle(&mut stmt, candle)?;
            }
        }
        tx.commit()?;

        let skipped = candles.len() - inserted;
        if skipped > 0 {
            debug!("{table}: skipped {skipped} row(s) with already-stored timestamps");
        }
        Ok(inserted)
    }

    pub fn row_count(&self, table: &str) -> Result<u64, StoreError> {
        let sql = schema::count_sql(table)?;
        let Some(conn) = self.connect_read_only()? else {
            return Ok(0);
        };
        if !table_exists(&conn, table)? {
            return Ok(0);
        }
        let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// (earliest, latest) stored timestamp, or None if the table has no rows.
    pub fn timestamp_span(&self, table: &str) -> Result<Option<(i64, i64)>, StoreError> {
        let sql = schema::timestamp_span_sql(table)?;
        let Some(conn) = self.connect_read_only()? else {
            return Ok(None);
        };
        if !table_exists(&conn, table)? {
            return Ok(None);
        }
        let span = conn.query_row(&sql, [], |row| {
            let min: Option<i64> = row.get(0)?;
            let max: Option<i64> = row.get(1)?;
            Ok(min.zip(max))
        })?;
        Ok(span)
    }

    /// All rows of a table in insertion order.
    pub fn read_rows(&self, table: &str) -> Result<Vec<Candle>, StoreError> {
        let sql = schema::select_sql(table)?;
        let Some(conn) = self.connect_read_only()? else {
            return Ok(Vec::new());
        };
        if !table_exists(&conn, table)? {
            return Ok(Vec::new());
        }
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], schema::row_to_candle)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Names of all tables in the store, sorted.
    pub fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        let Some(conn) = self.connect_read_only()? else {
            return Ok(Vec::new());
        };
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}
