use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid table name: '{0}'")]
    InvalidTableName(String),

    #[error("Invalid interval: {0} (allowed: 1, 5, 15, 30, 60, 240, 720, 1440, 10080, 21600)")]
    InvalidInterval(u32),

    #[error("Invalid pair: {0}")]
    InvalidPair(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}
