use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// Format used for the `formatted_time` column.
pub const FORMATTED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where a stored candle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Bulk historical CSV file. Stored as `0`.
    Historical,
    /// Remote OHLC API. Stored as `1`.
    Api,
}

impl Source {
    /// Integer code persisted in the `source` column.
    pub fn code(self) -> i64 {
        match self {
            Source::Historical => 0,
            Source::Api => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Source::Historical),
            1 => Some(Source::Api),
            _ => None,
        }
    }
}

/// A single OHLCVT candle row as stored in a `<pair>_<interval>` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub pair: String,
    /// Interval open time, Unix seconds (UTC).
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Volume-weighted average price. Historical files do not carry it.
    pub vwap: Option<f64>,
    pub volume: f64,
    /// Number of trades in the interval.
    pub count: i64,
    pub source: Source,
}

impl Candle {
    /// Human-readable UTC rendering of `timestamp`, e.g. `2024-01-01 00:00:00`.
    ///
    /// Timestamps outside chrono's range render as an empty string.
    pub fn formatted_time(&self) -> String {
        format_timestamp(self.timestamp)
    }
}

pub fn format_timestamp(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format(FORMATTED_TIME_FORMAT).to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: i64) -> Candle {
        Candle {
            pair: "XBTUSD".to_string(),
            timestamp,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            vwap: None,
            volume: 10.0,
            count: 5,
            source: Source::Historical,
        }
    }

    #[test]
    fn formatted_time_is_utc() {
        assert_eq!(sample(946684800).formatted_time(), "2000-01-01 00:00:00");
        assert_eq!(sample(1700000000).formatted_time(), "2023-11-14 22:13:20");
    }

    #[test]
    fn formatted_time_epoch() {
        assert_eq!(sample(0).formatted_time(), "1970-01-01 00:00:00");
    }

    #[test]
    fn source_codes() {
        assert_eq!(Source::Historical.code(), 0);
        assert_eq!(Source::Api.code(), 1);
        assert_eq!(Source::from_code(0), Some(Source::Historical));
        assert_eq!(Source::from_code(1), Some(Source::Api));
        assert_eq!(Source::from_code(7), None);
    }
}
