use ohlcvt_core::candle::{Candle, format_timestamp};
use ohlcvt_core::interval::Interval;
use ohlcvt_core::pair::Pair;
use ohlcvt_core::store::CandleStore;
use ohlcvt_providers::provider::OhlcProvider;
use tracing::{debug, info, warn};

use crate::error::LoadError;

/// Result of one incremental fetch for a pair/interval.
#[derive(Debug)]
pub struct FetchOutcome {
    pub table: String,
    /// Watermark read before the first request.
    pub watermark: i64,
    /// Every candle the provider returned, before filtering.
    pub fetched: Vec<Candle>,
    /// Rows actually inserted.
    pub appended: usize,
    pub pages: u32,
    /// Error that ended the page loop after earlier pages were committed.
    pub truncated_by: Option<LoadError>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.truncated_by.is_none()
    }
}

/// One fetched and appended page.
struct PageStep {
    candles: Vec<Candle>,
    newest: Option<i64>,
    inserted: usize,
}

/// Append candles newer than the table's watermark.
///
/// Only rows with `timestamp` strictly greater than the watermark (and than
/// anything appended earlier in this run) are written. Another page is
/// requested only while the previous one was full and brought new rows, up
/// to `max_pages` requests.
///
/// A failure before anything was inserted is logged here with the request
/// context and returned. A failure on a later page stops the loop and is
/// carried in [`FetchOutcome::truncated_by`] next to the rows already
/// committed.
pub async fn fetch_and_append_latest(
    provider: &dyn OhlcProvider,
    store: &CandleStore,
    pair: &Pair,
    interval: Interval,
    max_pages: u32,
) -> Result<FetchOutcome, LoadError> {
    let table = pair.table_name(interval);
    let result = fetch_pages(provider, store, pair, interval, &table, max_pages).await;
    if let Err(e) = &result {
        warn!(
            "{table}: incremental fetch from {} failed (pair={}, interval={interval}) [{}]: {e}",
            provider.name(),
            pair.code(),
            e.kind()
        );
    }
    result
}

async fn fetch_pages(
    provider: &dyn OhlcProvider,
    store: &CandleStore,
    pair: &Pair,
    interval: Interval,
    table: &str,
    max_pages: u32,
) -> Result<FetchOutcome, LoadError> {
    store.create_table(table).map_err(LoadError::store(table))?;
    let watermark = store.max_timestamp(table).map_err(LoadError::store(table))?;
    info!(
        "{table}: watermark {watermark} ({} UTC)",
        format_timestamp(watermark)
    );

    let mut high_water = watermark;
    let mut fetched = Vec::new();
    let mut appended = 0;
    let mut pages = 0;
    let mut truncated_by = None;

    while pages < max_pages.max(1) {
        let since = high_water;
        let step = match fetch_page(provider, store, pair, interval, table, since).await {
            Ok(step) => step,
            Err(e) if appended == 0 => return Err(e),
            Err(e) => {
                warn!(
                    "{table}: page {} failed (interval={interval}, since={since}) [{}]: {e}",
                    pages + 1,
                    e.kind()
                );
                warn!("{table}: stopping early, {appended} candle(s) already appended");
                truncated_by = Some(e);
                break;
            }
        };
        pages += 1;
        appended += step.inserted;

        let returned = step.candles.len();
        fetched.extend(step.candles);

        match step.newest {
            Some(ts) if returned >= provider.page_limit() => high_water = ts,
            _ => break,
        }
    }

    info!(
        "{table}: appended {appended} candle(s) from {} in {pages} page(s)",
        provider.name()
    );

    Ok(FetchOutcome {
        table: table.to_string(),
        watermark,
        fetched,
        appended,
        pages,
        truncated_by,
    })
}

async fn fetch_page(
    provider: &dyn OhlcProvider,
    store: &CandleStore,
    pair: &Pair,
    interval: Interval,
    table: &str,
    since: i64,
) -> Result<PageStep, LoadError> {
    let page = provider
        .fetch_ohlc(pair, interval, since)
        .await
        .map_err(|source| LoadError::RemoteFetchFailed {
            pair: pair.code(),
            interval,
            since,
            source,
        })?;

    let newer: Vec<Candle> = page
        .candles
        .iter()
        .filter(|c| c.timestamp > since)
        .cloned()
        .collect();
    let inserted = store.append(table, &newer).map_err(LoadError::store(table))?;
    debug!(
        "{table}: {} returned, {} newer than {since}, {inserted} inserted (cursor {})",
        page.candles.len(),
        newer.len(),
        page.last
    );

    Ok(PageStep {
        newest: newer.iter().map(|c| c.timestamp).max(),
        candles: page.candles,
        inserted,
    })
}
