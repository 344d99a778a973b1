use async_trait::async_trait;
use ohlcvt_core::candle::{Candle, Source};
use ohlcvt_core::interval::Interval;
use ohlcvt_core::pair::Pair;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::{OhlcPage, OhlcProvider};

const KRAKEN_OHLC_URL: &str = "https://api.kraken.com/0/public/OHLC";

/// Kraken returns at most this many candles per OHLC call.
pub const KRAKEN_PAGE_LIMIT: usize = 720;

/// Longest response excerpt carried in a parse error.
const BODY_EXCERPT_LEN: usize = 2048;

/// Kraken public market data provider.
/// No authentication required.
pub struct KrakenProvider {
    client: Client,
    base_url: String,
}

impl KrakenProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: KRAKEN_OHLC_URL.to_string(),
        }
    }

    /// Create with a custom OHLC endpoint URL (for testing).
    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for KrakenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct KrakenResponse {
    #[serde(default)]
    error: Vec<String>,
    result: Option<Map<String, Value>>,
}

/// Kraken sends prices as strings and times/counts as integers, but the
/// encoding is not guaranteed, so every field accepts either.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Numeric {
    fn as_f64(&self, field: &str) -> Result<f64, ProviderError> {
        match self {
            Numeric::Int(v) => Ok(*v as f64),
            Numeric::Float(v) => Ok(*v),
            Numeric::Text(s) => s
                .trim()
                .parse()
                .map_err(|e| ProviderError::Parse(format!("invalid {field} '{s}': {e}"))),
        }
    }

    fn as_i64(&self, field: &str) -> Result<i64, ProviderError> {
        let whole = |v: f64| {
            if v.fract() == 0.0 && v.is_finite() {
                Ok(v as i64)
            } else {
                Err(ProviderError::Parse(format!("invalid {field}: {v} is not an integer")))
            }
        };
        match self {
            Numeric::Int(v) => Ok(*v),
            Numeric::Float(v) => whole(*v),
            Numeric::Text(s) => match s.trim().parse::<i64>() {
                Ok(v) => Ok(v),
                Err(_) => whole(self.as_f64(field)?),
            },
        }
    }
}

/// `[time, open, high, low, close, vwap, volume, count]`
#[derive(Debug, Deserialize)]
struct KrakenCandle(
    Numeric,
    Numeric,
    Numeric,
    Numeric,
    Numeric,
    Numeric,
    Numeric,
    Numeric,
);

impl KrakenCandle {
    fn to_candle(&self, pair_code: &str) -> Result<Candle, ProviderError> {
        Ok(Candle {
            pair: pair_code.to_string(),
            timestamp: self.0.as_i64("time")?,
            open: self.1.as_f64("open")?,
            high: self.2.as_f64("high")?,
            low: self.3.as_f64("low")?,
            close: self.4.as_f64("close")?,
            vwap: Some(self.5.as_f64("vwap")?),
            volume: self.6.as_f64("volume")?,
            count: self.7.as_i64("count")?,
            source: Source::Api,
        })
    }
}

fn excerpt(body: &str) -> &str {
    match body.char_indices().nth(BODY_EXCERPT_LEN) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

/// Parse an OHLC response body.
///
/// `result` holds the candle array under Kraken's canonical pair name
/// (e.g. `XXBTZUSD` for a `XBTUSD` request) next to the `last` cursor.
/// Candles are tagged with `pair_code`, the code the caller asked for.
pub fn parse_ohlc_body(body: &str, pair_code: &str) -> Result<OhlcPage, ProviderError> {
    let response: KrakenResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::Parse(format!("failed to parse response: {e}; body: {}", excerpt(body)))
    })?;

    if !response.error.is_empty() {
        return Err(ProviderError::Api {
            status: 0,
            message: response.error.join("; "),
        });
    }

    let mut result = response.result.ok_or_else(|| {
        ProviderError::Parse(format!("no 'result' in response; body: {}", excerpt(body)))
    })?;

    let last: Numeric = result
        .remove("last")
        .map(serde_json::from_value::<Numeric>)
        .transpose()
        .map_err(|e| ProviderError::Parse(format!("invalid 'last' cursor: {e}")))?
        .ok_or_else(|| {
            ProviderError::Parse(format!("no 'last' cursor in result; body: {}", excerpt(body)))
        })?;
    let last = last.as_i64("last")?;

    let (key, rows) = result.into_iter().next().ok_or_else(|| {
        ProviderError::Parse(format!(
            "no candle array for {pair_code} in result; body: {}",
            excerpt(body)
        ))
    })?;

    let rows: Vec<KrakenCandle> = serde_json::from_value(rows)
        .map_err(|e| ProviderError::Parse(format!("invalid candle array under '{key}': {e}")))?;

    let candles = rows
        .iter()
        .map(|row| row.to_candle(pair_code))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(OhlcPage { candles, last })
}

#[async_trait]
impl OhlcProvider for KrakenProvider {
    fn name(&self) -> &str {
        "kraken"
    }

    fn page_limit(&self) -> usize {
        KRAKEN_PAGE_LIMIT
    }

    async fn fetch_ohlc(
        &self,
        pair: &Pair,
        interval: Interval,
        since: i64,
    ) -> Result<OhlcPage, ProviderError> {
        let pair_code = pair.code();
        debug!(
            "GET {}?pair={pair_code}&interval={interval}&since={since}",
            self.base_url
        );

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("pair", pair_code.clone()),
                ("interval", interval.to_string()),
                ("since", since.to_string()),
            ])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ProviderError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status,
                message: body,
            });
        }

        let body = response.text().await?;
        parse_ohlc_body(&body, &pair_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kraken_response_json() {
        let json = r#"{
            "error": [],
            "result": {
                "XXBTZUSD": [
                    [1000, "1", "2", "0.5", "1.5", "1.2", "10", "5"],
                    [2000, "2", "3", "1.5", "2.5", "2.2", "20", "8"]
                ],
                "last": 2000
            }
        }"#;

        let page = parse_ohlc_body(json, "XBTUSD").unwrap();
        assert_eq!(page.last, 2000);
        assert_eq!(page.candles.len(), 2);

        let first = &page.candles[0];
        assert_eq!(first.pair, "XBTUSD");
        assert_eq!(first.timestamp, 1000);
        assert_eq!(first.open, 1.0);
        assert_eq!(first.high, 2.0);
        assert_eq!(first.low, 0.5);
        assert_eq!(first.close, 1.5);
        assert_eq!(first.vwap, Some(1.2));
        assert_eq!(first.volume, 10.0);
        assert_eq!(first.count, 5);
        assert_eq!(first.source, Source::Api);

        assert_eq!(page.candles[1].timestamp, 2000);
        assert_eq!(page.candles[1].count, 8);
    }

    #[test]
    fn parse_without_error_field() {
        let json = r#"{"result": {"XETHZUSD": [[1700000000, "2000.1", "2010.0", "1990.5", "2005.2", "2001.7", "3.25", 17]], "last": 1699999940}}"#;
        let page = parse_ohlc_body(json, "ETHUSD").unwrap();
        assert_eq!(page.last, 1699999940);
        assert_eq!(page.candles[0].count, 17);
        assert_eq!(page.candles[0].vwap, Some(2001.7));
    }

    #[test]
    fn parse_empty_candle_array() {
        let json = r#"{"error": [], "result": {"XXBTZUSD": [], "last": 1000}}"#;
        let page = parse_ohlc_body(json, "XBTUSD").unwrap();
        assert!(page.candles.is_empty());
        assert_eq!(page.last, 1000);
    }

    #[test]
    fn parse_api_error_array() {
        let json = r#"{"error": ["EQuery:Unknown asset pair"]}"#;
        match parse_ohlc_body(json, "FOOBAR") {
            Err(ProviderError::Api { message, .. }) => {
                assert_eq!(message, "EQuery:Unknown asset pair");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn parse_missing_result_includes_body() {
        let json = r#"{"error": []}"#;
        match parse_ohlc_body(json, "XBTUSD") {
            Err(ProviderError::Parse(msg)) => assert!(msg.contains(r#"{"error": []}"#)),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn parse_missing_last_cursor() {
        let json = r#"{"error": [], "result": {"XXBTZUSD": []}}"#;
        assert!(matches!(
            parse_ohlc_body(json, "XBTUSD"),
            Err(ProviderError::Parse(_))
        ));
    }

    #[test]
    fn parse_missing_pair_key() {
        let json = r#"{"error": [], "result": {"last": 1000}}"#;
        assert!(matches!(
            parse_ohlc_body(json, "XBTUSD"),
            Err(ProviderError::Parse(_))
        ));
    }

    #[test]
    fn parse_short_candle_row() {
        let json = r#"{"error": [], "result": {"XXBTZUSD": [[1000, "1", "2"]], "last": 1000}}"#;
        assert!(matches!(
            parse_ohlc_body(json, "XBTUSD"),
            Err(ProviderError::Parse(_))
        ));
    }

    #[test]
    fn parse_bad_price() {
        let json = r#"{"error": [], "result": {"XXBTZUSD": [[1000, "abc", "2", "0.5", "1.5", "1.2", "10", 5]], "last": 1000}}"#;
        match parse_ohlc_body(json, "XBTUSD") {
            Err(ProviderError::Parse(msg)) => assert!(msg.contains("open")),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn parse_not_json() {
        let err = parse_ohlc_body("<html>502 Bad Gateway</html>", "XBTUSD").unwrap_err();
        assert!(err.to_string().contains("502 Bad Gateway"));
    }

    #[test]
    fn numeric_conversions() {
        assert_eq!(Numeric::Text("5".into()).as_i64("count").unwrap(), 5);
        assert_eq!(Numeric::Text("5.0".into()).as_i64("count").unwrap(), 5);
        assert!(Numeric::Text("5.5".into()).as_i64("count").is_err());
        assert_eq!(Numeric::Float(1000.0).as_i64("time").unwrap(), 1000);
        assert_eq!(Numeric::Int(3).as_f64("open").unwrap(), 3.0);
        assert_eq!(Numeric::Text(" 0.25 ".into()).as_f64("open").unwrap(), 0.25);
    }

    #[test]
    fn excerpt_caps_length() {
        let body = "x".repeat(BODY_EXCERPT_LEN + 100);
        assert_eq!(excerpt(&body).len(), BODY_EXCERPT_LEN);
        assert_eq!(excerpt("short"), "short");
    }

    #[test]
    fn default_endpoint() {
        assert_eq!(KrakenProvider::new().base_url(), KRAKEN_OHLC_URL);
        let provider = KrakenProvider::with_base_url("http://localhost:9999/ohlc".into());
        assert_eq!(provider.base_url(), "http://localhost:9999/ohlc");
        assert_eq!(provider.page_limit(), 720);
    }
}
