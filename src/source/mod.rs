//! Data source module
//!
//! Providers for the three input series and asset metadata: the Pendle REST
//! API, or a JSON snapshot with the same shapes.

mod pendle;
mod snapshot;

pub use pendle::{PendleAsset, PendleClient, PendleConfig, PENDLE_API_URL};
pub use snapshot::{Snapshot, SnapshotSource};

use crate::series::{MarketSample, PriceSample};
use crate::transaction::TransactionRecord;
use crate::valuation::ValuationInputs;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Base type of the yield token asset
pub const YT_BASE_TYPE: &str = "YT";

/// Data source errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unsupported network: {0}")]
    UnsupportedNetwork(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// No asset matches; the run cannot proceed without a maturity
    #[error("no {base_type} asset found at {address}")]
    AssetNotFound { base_type: String, address: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Supported chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Ethereum,
    Arbitrum,
    Mantle,
}

impl Network {
    /// EVM chain id used in API paths
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Ethereum => 1,
            Network::Arbitrum => 42161,
            Network::Mantle => 5000,
        }
    }
}

impl FromStr for Network {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ethereum" => Ok(Network::Ethereum),
            "arbitrum" => Ok(Network::Arbitrum),
            "mantle" => Ok(Network::Mantle),
            other => Err(SourceError::UnsupportedNetwork(other.to_string())),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Ethereum => write!(f, "ethereum"),
            Network::Arbitrum => write!(f, "arbitrum"),
            Network::Mantle => write!(f, "mantle"),
        }
    }
}

/// Resolved asset metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub address: String,
    /// Display symbol (e.g. "YT-eETH-27JUN2024")
    pub symbol: String,
    /// Expiry of the yield token
    pub maturity: DateTime<Utc>,
}

/// Which transactions to fetch
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFilter {
    pub actions: Vec<String>,
    pub origins: Vec<String>,
    /// Minimum USD notional
    pub min_value: f64,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            actions: vec![
                "SWAP_PT".to_string(),
                "SWAP_PY".to_string(),
                "SWAP_YT".to_string(),
            ],
            origins: vec!["PENDLE_MARKET".to_string(), "YT".to_string()],
            min_value: 0.0,
        }
    }
}

impl TransactionFilter {
    /// Whether a record passes the filter
    ///
    /// A non-empty allow-list requires the field to be present and listed.
    pub fn matches(&self, record: &TransactionRecord) -> bool {
        let listed = |allowed: &[String], value: &Option<String>| {
            allowed.is_empty() || value.as_ref().is_some_and(|v| allowed.contains(v))
        };
        let value_ok = record
            .valuation
            .as_ref()
            .and_then(|v| v.usd)
            .map_or(true, |usd| usd >= self.min_value);

        listed(&self.actions, &record.action) && listed(&self.origins, &record.origin) && value_ok
    }
}

/// Provider of the APY, price and transaction series for one market
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Hourly APY history and hourly YT OHLCV between `start` and `end`
    async fn fetch_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(Vec<MarketSample>, Vec<PriceSample>), SourceError>;

    /// All swap transactions of the market, unsorted
    async fn fetch_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, SourceError>;
}

/// Resolves an asset's symbol and maturity
#[async_trait]
pub trait AssetResolver: Send + Sync {
    async fn resolve_asset(&self, base_type: &str, address: &str) -> Result<AssetInfo, SourceError>;
}

/// Collect everything a valuation run needs from one source
pub async fn gather<S>(
    source: &S,
    yt_address: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    filter: &TransactionFilter,
) -> Result<ValuationInputs, SourceError>
where
    S: MarketDataSource + AssetResolver,
{
    let asset = source.resolve_asset(YT_BASE_TYPE, yt_address).await?;
    tracing::info!(symbol = %asset.symbol, maturity = %asset.maturity, "Resolved asset");

    let ((market, prices), transactions) = tokio::try_join!(
        source.fetch_history(start, end),
        source.fetch_transactions(filter)
    )?;

    tracing::info!(
        market_samples = market.len(),
        price_samples = prices.len(),
        transactions = transactions.len(),
        "Fetched market data"
    );

    Ok(ValuationInputs {
        asset,
        market,
        prices,
        transactions,
    })
}
