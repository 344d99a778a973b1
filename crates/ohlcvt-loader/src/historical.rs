use std::fs::File;
use std::path::Path;

use ohlcvt_core::candle::{Candle, Source};
use ohlcvt_core::store::CandleStore;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::error::LoadError;

/// Rows read and appended per chunk, bounding memory for multi-GB files.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoricalLoadSummary {
    /// Rows inserted into the table.
    pub rows: usize,
    pub chunks: usize,
}

/// One headerless historical CSV row:
/// `timestamp, open, high, low, close, volume, count`.
#[derive(Debug, Deserialize)]
struct HistoricalRecord(i64, f64, f64, f64, f64, f64, i64);

impl HistoricalRecord {
    fn into_candle(self, pair: &str) -> Candle {
        Candle {
            pair: pair.to_string(),
            timestamp: self.0,
            open: self.1,
            high: self.2,
            low: self.3,
            close: self.4,
            vwap: None,
            volume: self.5,
            count: self.6,
            source: Source::Historical,
        }
    }
}

/// Pair code encoded in a historical file name: `XBTUSD_60.csv` -> `XBTUSD`.
pub fn pair_from_file_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    let pair = stem.split_once('_').map_or(stem, |(pair, _)| pair);
    (!pair.is_empty()).then(|| pair.to_string())
}

/// Stream a historical CSV into `table`, `chunk_size` rows at a time, in file order.
///
/// A missing or unreadable file is logged and returned as
/// [`LoadError::HistoricalFileMissing`].
pub fn load_historical_file(
    store: &CandleStore,
    table: &str,
    path: &Path,
    chunk_size: usize,
) -> Result<HistoricalLoadSummary, LoadError> {
    let file = File::open(path).map_err(|source| {
        error!(
            "{table}: cannot open historical file {}: {source}",
            path.display()
        );
        LoadError::HistoricalFileMissing {
            path: path.to_path_buf(),
            source,
        }
    })?;

    let pair = pair_from_file_name(path).ok_or_else(|| LoadError::HistoricalParse {
        path: path.to_path_buf(),
        line: 0,
        message: "cannot derive pair from file name".into(),
    })?;

    info!("{table}: loading historical file {}", path.display());

    let chunk_size = chunk_size.max(1);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(file);

    let mut summary = HistoricalLoadSummary::default();
    let mut chunk: Vec<Candle> = Vec::with_capacity(chunk_size.min(DEFAULT_CHUNK_SIZE));

    for (index, record) in reader.deserialize::<HistoricalRecord>().enumerate() {
        let record = record.map_err(|e| LoadError::HistoricalParse {
            path: path.to_path_buf(),
            line: e
                .position()
                .map_or(index as u64 + 1, |position| position.line()),
            message: e.to_string(),
        })?;
        chunk.push(record.into_candle(&pair));

        if chunk.len() == chunk_size {
            append_chunk(store, table, &mut chunk, &mut summary)?;
        }
    }

    if !chunk.is_empty() {
        append_chunk(store, table, &mut chunk, &mut summary)?;
    }

    info!(
        "{table}: loaded {} historical row(s) in {} chunk(s)",
        summary.rows, summary.chunks
    );
    Ok(summary)
}

fn append_chunk(
    store: &CandleStore,
    table: &str,
    chunk: &mut Vec<Candle>,
    summary: &mut HistoricalLoadSummary,
) -> Result<(), LoadError> {
    let inserted = store.append(table, chunk).map_err(LoadError::store(table))?;
    summary.rows += inserted;
    summary.chunks += 1;
    debug!(
        "{table}: chunk {} appended ({inserted} row(s))",
        summary.chunks
    );
    chunk.clear();
    Ok(())
}
