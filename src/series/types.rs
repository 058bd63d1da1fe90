//! Hourly market and price samples

use super::Timestamped;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One hourly APY observation for a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSample {
    /// Sample time (UTC)
    pub timestamp: DateTime<Utc>,
    /// Market-implied APY as a fraction (0.10 = 10%)
    pub implied_apy: f64,
    /// Realized APY of the underlying asset
    pub underlying_apy: f64,
}

impl MarketSample {
    pub fn new(timestamp: DateTime<Utc>, implied_apy: f64, underlying_apy: f64) -> Self {
        Self {
            timestamp,
            implied_apy,
            underlying_apy,
        }
    }
}

impl Timestamped for MarketSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// One hourly OHLCV bar for the yield token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl PriceSample {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl Timestamped for PriceSample {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// APY sample with the as-of price bar attached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketPoint {
    #[serde(flatten)]
    pub sample: MarketSample,
    /// Latest price bar at or before the sample, if any
    pub price: Option<PriceSample>,
}

impl Timestamped for MarketPoint {
    fn timestamp(&self) -> DateTime<Utc> {
        self.sample.timestamp
    }
}
