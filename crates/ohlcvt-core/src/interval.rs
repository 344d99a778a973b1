use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Candle durations (minutes) accepted by the API or shipped as historical files.
pub const ALLOWED_MINUTES: [u32; 10] = [1, 5, 15, 30, 60, 240, 720, 1440, 10080, 21600];

/// Candle duration in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Interval(u32);

impl Interval {
    pub const M1: Interval = Interval(1);
    pub const M5: Interval = Interval(5);
    pub const M15: Interval = Interval(15);
    pub const H1: Interval = Interval(60);
    pub const H4: Interval = Interval(240);
    pub const H12: Interval = Interval(720);
    pub const D1: Interval = Interval(1440);
    pub const W1: Interval = Interval(10080);
    pub const D15: Interval = Interval(21600);

    pub fn new(minutes: u32) -> Result<Self, StoreError> {
        if ALLOWED_MINUTES.contains(&minutes) {
            Ok(Self(minutes))
        } else {
            Err(StoreError::InvalidInterval(minutes))
        }
    }

    pub fn minutes(self) -> u32 {
        self.0
    }
}

impl TryFrom<u32> for Interval {
    type Error = StoreError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        Self::new(minutes)
    }
}

impl From<Interval> for u32 {
    fn from(interval: Interval) -> Self {
        interval.0
    }
}

impl FromStr for Interval {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let minutes: u32 = s
            .trim()
            .parse()
            .map_err(|_| StoreError::InvalidData(format!("interval must be minutes, got '{s}'")))?;
        Self::new(minutes)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
