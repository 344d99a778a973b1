use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use ohlcvt_core::candle::{Candle, Source};
use ohlcvt_core::interval::Interval;
use ohlcvt_core::pair::Pair;
use ohlcvt_providers::error::ProviderError;
use ohlcvt_providers::provider::{OhlcPage, OhlcProvider};

/// Provider that replays queued responses per interval and records each call.
/// An interval with nothing queued answers with an empty page.
pub struct ScriptedProvider {
    page_limit: usize,
    responses: Mutex<HashMap<Interval, VecDeque<Result<OhlcPage, ProviderError>>>>,
    calls: Mutex<Vec<(Interval, i64)>>,
}

impl ScriptedProvider {
    pub fn new(page_limit: usize) -> Self {
        Self {
            page_limit,
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, interval: Interval, response: Result<OhlcPage, ProviderError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(interval)
            .or_default()
            .push_back(response);
    }

    /// `(interval, since)` for every call made so far.
    pub fn calls(&self) -> Vec<(Interval, i64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl OhlcProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn page_limit(&self) -> usize {
        self.page_limit
    }

    async fn fetch_ohlc(
        &self,
        _pair: &Pair,
        interval: Interval,
        since: i64,
    ) -> Result<OhlcPage, ProviderError> {
        self.calls.lock().unwrap().push((interval, since));
        let next = self
            .responses
            .lock()
            .unwrap()
            .get_mut(&interval)
            .and_then(VecDeque::pop_front);
        next.unwrap_or(Ok(OhlcPage {
            candles: Vec::new(),
            last: since,
        }))
    }
}

pub fn api_candle(pair: &str, timestamp: i64) -> Candle {
    Candle {
        pair: pair.to_string(),
        timestamp,
        open: 1.0,
        high: 2.0,
        low: 0.5,
        close: 1.5,
        vwap: Some(1.2),
        volume: 10.0,
        count: 5,
        source: Source::Api,
    }
}

pub fn page(pair: &str, timestamps: &[i64]) -> OhlcPage {
    OhlcPage {
        candles: timestamps.iter().map(|&ts| api_candle(pair, ts)).collect(),
        last: timestamps.iter().copied().max().unwrap_or(0),
    }
}

pub fn network_error() -> ProviderError {
    ProviderError::Api {
        status: 503,
        message: "service unavailable".into(),
    }
}
