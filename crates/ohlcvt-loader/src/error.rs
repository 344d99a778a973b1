use std::path::PathBuf;

use ohlcvt_core::error::StoreError;
use ohlcvt_core::interval::Interval;
use ohlcvt_providers::error::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("historical file missing or unreadable: {}: {source}", .path.display())]
    HistoricalFileMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("historical file {}, line {line}: {message}", .path.display())]
    HistoricalParse {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("remote fetch failed for {pair} (interval {interval}, since {since}): {source}")]
    RemoteFetchFailed {
        pair: String,
        interval: Interval,
        since: i64,
        #[source]
        source: ProviderError,
    },

    #[error("store operation failed on {table}: {source}")]
    Store {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LoadError {
    /// Stable short name for log lines and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::HistoricalFileMissing { .. } => "historical_file_missing",
            LoadError::HistoricalParse { .. } => "historical_parse",
            LoadError::RemoteFetchFailed { .. } => "remote_fetch_failed",
            LoadError::Store { .. } => "store_write_failed",
            LoadError::Config(_) => "config",
        }
    }

    pub(crate) fn store(table: &str) -> impl FnOnce(StoreError) -> LoadError + '_ {
        move |source| LoadError::Store {
            table: table.to_string(),
            source,
        }
    }
}
