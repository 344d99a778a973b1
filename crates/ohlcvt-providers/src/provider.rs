use async_trait::async_trait;
use ohlcvt_core::candle::Candle;
use ohlcvt_core::interval::Interval;
use ohlcvt_core::pair::Pair;

use crate::error::ProviderError;

/// One response worth of candles from a remote OHLC source.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcPage {
    /// Candles in the order the source returned them, tagged `Source::Api`.
    pub candles: Vec<Candle>,
    /// Continuation cursor reported by the source.
    pub last: i64,
}

/// Trait for fetching OHLCVT candles from a remote API.
#[async_trait]
pub trait OhlcProvider: Send + Sync {
    /// Provider name (for logging/display).
    fn name(&self) -> &str;

    /// Most candles a single call can return. A shorter page means the
    /// caller has caught up.
    fn page_limit(&self) -> usize;

    /// Fetch one page of candles for `pair` at `interval` starting after `since`
    /// (Unix seconds). Sources may include rows at or before `since`.
    async fn fetch_ohlc(
        &self,
        pair: &Pair,
        interval: Interval,
        since: i64,
    ) -> Result<OhlcPage, ProviderError>;
}
