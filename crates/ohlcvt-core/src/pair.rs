use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::interval::Interval;

/// A tradable pair, e.g. base `XBT` quoted in `USD`.
///
/// Both parts end up in table names and file paths, so they are restricted
/// to ASCII alphanumerics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pair {
    symbol: String,
    quote: String,
}

impl Pair {
    pub fn new(symbol: &str, quote: &str) -> Result<Self, StoreError> {
        let symbol = symbol.trim().to_uppercase();
        let quote = quote.trim().to_uppercase();
        for part in [&symbol, &quote] {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(StoreError::InvalidPair(format!(
                    "'{symbol}/{quote}': symbol and quote must be non-empty alphanumerics"
                )));
            }
        }
        Ok(Self { symbol, quote })
    }

    /// Base asset, also the name of the historical file directory.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Pair code as sent to the API, e.g. `XBTUSD`.
    pub fn code(&self) -> String {
        format!("{}{}", self.symbol, self.quote)
    }

    /// Table holding this pair's candles for `interval`, e.g. `XBTUSD_60`.
    pub fn table_name(&self, interval: Interval) -> String {
        format!("{}_{}", self.code(), interval)
    }

    /// File name of the historical CSV for `interval`, e.g. `XBTUSD_60.csv`.
    pub fn historical_file_name(&self, interval: Interval) -> String {
        format!("{}.csv", self.table_name(interval))
    }
}

impl FromStr for Pair {
    type Err = StoreError;

    /// Parses `SYMBOL/QUOTE` (also accepts `SYMBOL:QUOTE`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (symbol, quote) = s
            .split_once('/')
            .or_else(|| s.split_once(':'))
            .ok_or_else(|| {
                StoreError::InvalidPair(format!("'{s}': expected SYMBOL/QUOTE, e.g. XBT/USD"))
            })?;
        Self::new(symbol, quote)
    }
}

impl TryFrom<String> for Pair {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pair> for String {
    fn from(pair: Pair) -> Self {
        pair.to_string()
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.symbol, self.quote)
    }
}
