//! Offline snapshot source
//!
//! A JSON document holding one market's asset metadata and raw series in the
//! same shapes the API returns.

use super::{AssetInfo, AssetResolver, MarketDataSource, SourceError, TransactionFilter};
use crate::series::{MarketSample, PriceSample};
use crate::transaction::TransactionRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Snapshot file contents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub asset: AssetInfo,
    #[serde(default)]
    pub market: Vec<MarketSample>,
    #[serde(default)]
    pub prices: Vec<PriceSample>,
    #[serde(default)]
    pub transactions: Vec<TransactionRecord>,
}

/// Serves a snapshot through the provider traits
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    snapshot: Snapshot,
}

impl SnapshotSource {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// Load a snapshot file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let source = Self::from_json(&content)?;
        tracing::debug!(
            path = %path.as_ref().display(),
            transactions = source.snapshot.transactions.len(),
            "Loaded snapshot"
        );
        Ok(source)
    }

    pub fn from_json(json: &str) -> Result<Self, SourceError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Earliest and latest timestamps across both history series
    pub fn history_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let timestamps = self
            .snapshot
            .market
            .iter()
            .map(|s| s.timestamp)
            .chain(self.snapshot.prices.iter().map(|p| p.timestamp));

        timestamps.fold(None, |range, t| match range {
            None => Some((t, t)),
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        })
    }
}

#[async_trait]
impl MarketDataSource for SnapshotSource {
    async fn fetch_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(Vec<MarketSample>, Vec<PriceSample>), SourceError> {
        let in_range = |t: DateTime<Utc>| t >= start && t <= end;

        let market = self
            .snapshot
            .market
            .iter()
            .filter(|s| in_range(s.timestamp))
            .cloned()
            .collect();
        let prices = self
            .snapshot
            .prices
            .iter()
            .filter(|p| in_range(p.timestamp))
            .cloned()
            .collect();

        Ok((market, prices))
    }

    async fn fetch_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, SourceError> {
        Ok(self
            .snapshot
            .transactions
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AssetResolver for SnapshotSource {
    async fn resolve_asset(&self, base_type: &str, address: &str) -> Result<AssetInfo, SourceError> {
        let asset = &self.snapshot.asset;
        if asset.address.eq_ignore_ascii_case(address) {
            Ok(asset.clone())
        } else {
            Err(SourceError::AssetNotFound {
                base_type: base_type.to_string(),
                address: address.to_string(),
            })
        }
    }
}
