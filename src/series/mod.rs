//! Time series module
//!
//! Hourly APY and OHLCV samples, and the backward as-of join that lines up
//! asynchronously-sampled series on a common timeline.

mod align;
mod types;

pub use align::{align_backward, align_backward_owned, align_backward_within, AlignError, SeriesSide};
pub use types::{MarketPoint, MarketSample, PriceSample};

use chrono::{DateTime, Utc};

/// Anything that sits on a UTC timeline
pub trait Timestamped {
    /// Timestamp used as the join key
    fn timestamp(&self) -> DateTime<Utc>;
}

impl<T: Timestamped> Timestamped for &T {
    fn timestamp(&self) -> DateTime<Utc> {
        (**self).timestamp()
    }
}

/// Sort a series by timestamp, keeping the relative order of equal timestamps
pub fn sort_by_timestamp<T: Timestamped>(mut series: Vec<T>) -> Vec<T> {
    series.sort_by_key(|row| row.timestamp());
    series
}

/// Merge APY history with OHLCV history onto the APY timeline
///
/// Each market sample picks up the latest price sample at or before it.
/// Both inputs must already be ascending.
pub fn merge_market_prices(
    market: &[MarketSample],
    prices: &[PriceSample],
) -> Result<Vec<MarketPoint>, AlignError> {
    align_backward(market, prices, |sample, price| MarketPoint {
        sample: sample.clone(),
        price: price.cloned(),
    })
}
