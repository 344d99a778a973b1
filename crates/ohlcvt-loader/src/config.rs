use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use ohlcvt_core::interval::Interval;
use ohlcvt_core::pair::Pair;
use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::historical::DEFAULT_CHUNK_SIZE;

/// Pages fetched per pair/interval before an incremental run gives up catching up.
pub const DEFAULT_MAX_PAGES: u32 = 4;

/// Everything the orchestrators need to know about a deployment.
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoaderConfig {
    /// Pairs to load, written `SYMBOL/QUOTE`.
    pub pairs: Vec<Pair>,
    /// Intervals fetchable from the remote API.
    pub api_intervals: BTreeSet<Interval>,
    /// Intervals that ship as historical CSV files.
    pub historical_intervals: BTreeSet<Interval>,
    /// SQLite database file.
    pub store_path: PathBuf,
    /// Root of the historical files, laid out as `<root>/<SYMBOL>/<PAIR>_<interval>.csv`.
    pub historical_root: PathBuf,
    /// Rows per historical append.
    pub chunk_size: usize,
    pub max_pages: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            pairs: vec![
                Pair::new("XBT", "USD").expect("valid default pair"),
                Pair::new("ETH", "USD").expect("valid default pair"),
            ],
            api_intervals: BTreeSet::from([
                Interval::M1,
                Interval::M5,
                Interval::M15,
                Interval::H1,
                Interval::H4,
                Interval::D1,
                Interval::W1,
                Interval::D15,
            ]),
            historical_intervals: BTreeSet::from([
                Interval::M1,
                Interval::M5,
                Interval::M15,
                Interval::H1,
                Interval::H12,
                Interval::D1,
            ]),
            store_path: PathBuf::from("kraken_ohlcvt.db"),
            historical_root: PathBuf::from("historical"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl LoaderConfig {
    pub fn from_json_str(json: &str) -> Result<Self, LoadError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| LoadError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, LoadError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LoadError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        if self.pairs.is_empty() {
            return Err(LoadError::Config("no pairs configured".into()));
        }
        if self.api_intervals.is_empty() && self.historical_intervals.is_empty() {
            return Err(LoadError::Config("no intervals configured".into()));
        }
        if self.chunk_size == 0 {
            return Err(LoadError::Config("chunk_size must be at least 1".into()));
        }
        if self.max_pages == 0 {
            return Err(LoadError::Config("max_pages must be at least 1".into()));
        }
        Ok(())
    }

    /// Every interval that gets a table: API ∪ historical, ascending.
    pub fn all_intervals(&self) -> BTreeSet<Interval> {
        self.api_intervals
            .union(&self.historical_intervals)
            .copied()
            .collect()
    }

    /// Directory holding a pair's historical files.
    pub fn historical_dir(&self, pair: &Pair) -> PathBuf {
        self.historical_root.join(pair.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_both_interval_sets() {
        let config = LoaderConfig::default();
        config.validate().unwrap();

        let all: Vec<u32> = config.all_intervals().into_iter().map(u32::from).collect();
        assert_eq!(all, vec![1, 5, 15, 60, 240, 720, 1440, 10080, 21600]);
        assert_eq!(config.pairs.len(), 2);
        assert_eq!(config.chunk_size, 100_000);
    }

    #[test]
    fn historical_dir_uses_symbol() {
        let config = LoaderConfig {
            historical_root: PathBuf::from("/data/kraken"),
            ..LoaderConfig::default()
        };
        let pair = Pair::new("ETH", "USD").unwrap();
        assert_eq!(config.historical_dir(&pair), PathBuf::from("/data/kraken/ETH"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = LoaderConfig::from_json_str(
            r#"{"pairs": ["SOL/EUR"], "api_intervals": [60, 1440], "store_path": "sol.db"}"#,
        )
        .unwrap();

        assert_eq!(config.pairs, vec![Pair::new("SOL", "EUR").unwrap()]);
        assert_eq!(
            config.api_intervals,
            BTreeSet::from([Interval::H1, Interval::D1])
        );
        assert_eq!(config.store_path, PathBuf::from("sol.db"));
        assert_eq!(
            config.historical_intervals,
            LoaderConfig::default().historical_intervals
        );
        assert_eq!(config.max_pages, DEFAULT_MAX_PAGES);
    }

    #[test]
    fn json_rejects_unknown_keys_and_bad_values() {
        assert!(LoaderConfig::from_json_str(r#"{"pair": ["XBT/USD"]}"#).is_err());
        assert!(LoaderConfig::from_json_str(r#"{"api_intervals": [2]}"#).is_err());
        assert!(LoaderConfig::from_json_str(r#"{"pairs": ["XBTUSD"]}"#).is_err());
    }

    #[test]
    fn validate_rejects_degenerate_configs() {
        let empty_pairs = LoaderConfig {
            pairs: vec![],
            ..LoaderConfig::default()
        };
        assert!(matches!(empty_pairs.validate(), Err(LoadError::Config(_))));

        let zero_chunk = LoaderConfig {
            chunk_size: 0,
            ..LoaderConfig::default()
        };
        assert!(zero_chunk.validate().is_err());

        let zero_pages = LoaderConfig {
            max_pages: 0,
            ..LoaderConfig::default()
        };
        assert!(zero_pages.validate().is_err());

        let no_intervals = LoaderConfig {
            api_intervals: BTreeSet::new(),
            historical_intervals: BTreeSet::new(),
            ..LoaderConfig::default()
        };
        assert!(no_intervals.validate().is_err());
    }

    #[test]
    fn from_json_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = LoaderConfig::from_json_file(&dir.path().join("nope.json")).unwrap_err();
        assert_eq!(err.kind(), "config");
    }
}
