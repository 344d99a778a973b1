use std::path::Path;

use ohlcvt_core::interval::Interval;
use ohlcvt_core::pair::Pair;
use ohlcvt_core::store::CandleStore;
use ohlcvt_providers::provider::OhlcProvider;
use tracing::{error, info, warn};

use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::historical::{HistoricalLoadSummary, load_historical_file};
use crate::incremental::{FetchOutcome, fetch_and_append_latest};

/// One labelled result inside a [`BatchReport`].
#[derive(Debug)]
pub struct BatchEntry<T> {
    /// Pair (`XBT/USD`) for initial loads, table (`XBTUSD_60`) for incremental runs.
    pub label: String,
    pub result: Result<T, LoadError>,
}

/// Per-item results of a batch run. A failed item never stops the items after it.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub outcomes: Vec<BatchEntry<T>>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            outcomes: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    pub fn push(&mut self, label: impl Into<String>, result: Result<T, LoadError>) {
        self.outcomes.push(BatchEntry {
            label: label.into(),
            result,
        });
    }

    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &T)> {
        self.outcomes
            .iter()
            .filter_map(|e| e.result.as_ref().ok().map(|v| (e.label.as_str(), v)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &LoadError)> {
        self.outcomes
            .iter()
            .filter_map(|e| e.result.as_ref().err().map(|err| (e.label.as_str(), err)))
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|e| e.result.is_ok())
    }

    pub fn extend(&mut self, other: BatchReport<T>) {
        self.outcomes.extend(other.outcomes);
    }
}

/// What an initial load did to one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInit {
    pub table: String,
    pub interval: Interval,
    /// `None` when no historical file is expected for the interval.
    pub historical: Option<HistoricalLoadSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialLoadSummary {
    pub pair: Pair,
    pub tables: Vec<TableInit>,
}

impl InitialLoadSummary {
    pub fn historical_rows(&self) -> usize {
        self.tables
            .iter()
            .filter_map(|t| t.historical)
            .map(|h| h.rows)
            .sum()
    }
}

/// Recreate every table for `pair` and fill those with a historical file.
///
/// Intervals come from the union of the API and historical sets. Tables are
/// dropped first, so this is a full refresh. A historical load failure stops
/// the pair and is returned.
pub fn initial_load(
    store: &CandleStore,
    pair: &Pair,
    historical_dir: &Path,
    config: &LoaderConfig,
) -> Result<InitialLoadSummary, LoadError> {
    let intervals = config.all_intervals();
    info!(
        "{pair}: initial load for intervals {:?} (historical: {:?})",
        intervals.iter().map(|i| i.minutes()).collect::<Vec<_>>(),
        config
            .historical_intervals
            .iter()
            .map(|i| i.minutes())
            .collect::<Vec<_>>()
    );

    let mut tables = Vec::with_capacity(intervals.len());
    for interval in intervals {
        let table = pair.table_name(interval);
        store.drop_table(&table).map_err(LoadError::store(&table))?;
        store.create_table(&table).map_err(LoadError::store(&table))?;

        let historical = if config.historical_intervals.contains(&interval) {
            let path = historical_dir.join(pair.historical_file_name(interval));
            match load_historical_file(store, &table, &path, config.chunk_size) {
                Ok(summary) => Some(summary),
                Err(e) => {
                    error!(
                        "{table}: historical load failed; check the files under {}",
                        historical_dir.display()
                    );
                    return Err(e);
                }
            }
        } else {
            info!("{table}: no historical file for this interval, left empty");
            None
        };

        tables.push(TableInit {
            table,
            interval,
            historical,
        });
    }

    Ok(InitialLoadSummary {
        pair: pair.clone(),
        tables,
    })
}

/// [`initial_load`] for every configured pair, reading historical files from
/// `<historical_root>/<SYMBOL>/`.
pub fn batch_initial_load(
    store: &CandleStore,
    config: &LoaderConfig,
) -> BatchReport<InitialLoadSummary> {
    let mut report = BatchReport::default();
    for pair in &config.pairs {
        info!("{pair}: starting initial load");
        let result = initial_load(store, pair, &config.historical_dir(pair), config);
        if let Err(e) = &result {
            warn!("{pair}: initial load aborted [{}]: {e}", e.kind());
        }
        report.push(pair.to_string(), result);
    }
    report
}

/// Incremental fetch for each interval of one pair, one after another.
/// A failing interval is recorded and the next one still runs.
pub async fn batch_incremental_load(
    provider: &dyn OhlcProvider,
    store: &CandleStore,
    pair: &Pair,
    intervals: impl IntoIterator<Item = Interval>,
    max_pages: u32,
) -> BatchReport<FetchOutcome> {
    let mut report = BatchReport::default();
    for interval in intervals {
        let result = fetch_and_append_latest(provider, store, pair, interval, max_pages).await;
        report.push(pair.table_name(interval), result);
    }
    report
}

/// [`batch_incremental_load`] for every configured pair over its API intervals.
pub async fn incremental_load_all(
    provider: &dyn OhlcProvider,
    store: &CandleStore,
    config: &LoaderConfig,
) -> BatchReport<FetchOutcome> {
    let mut report = BatchReport::default();
    for pair in &config.pairs {
        let pair_report = batch_incremental_load(
            provider,
            store,
            pair,
            config.api_intervals.iter().copied(),
            config.max_pages,
        )
        .await;
        report.extend(pair_report);
    }
    report
}
