//! Raw transaction records as returned by the Pendle transactions endpoint
//!
//! Records are parsed once at ingestion. Fields the valuation does not use are
//! kept verbatim in `extra` so that duplicate detection sees the whole record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A swap transaction with nested input/output legs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: Option<String>,
    pub chain_id: Option<u64>,
    pub tx_hash: Option<String>,
    pub block_number: Option<u64>,
    /// Execution time, normalized to UTC on parse
    pub timestamp: DateTime<Utc>,
    /// Action kind (e.g. "SWAP_YT")
    pub action: Option<String>,
    /// Origin (e.g. "PENDLE_MARKET")
    pub origin: Option<String>,
    pub user: Option<String>,
    pub market: Option<MarketRef>,
    #[serde(default)]
    pub inputs: Vec<TransactionItem>,
    #[serde(default)]
    pub outputs: Vec<TransactionItem>,
    pub valuation: Option<Valuation>,
    /// Market implied APY at execution
    pub implied_apy: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Market the transaction executed against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRef {
    pub address: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// One input or output leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItem {
    pub asset: Option<AssetRef>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Asset moved by a leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub address: Option<String>,
    /// Pendle asset kind: "PT", "YT", "SY", "PENDLE_LP", ...
    pub base_type: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Transaction notional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub usd: Option<f64>,
    /// Notional in the accounting asset
    pub acc: Option<f64>,
}

impl TransactionRecord {
    /// Parse a JSON array of records
    pub fn parse_many(json: &str) -> serde_json::Result<Vec<Self>> {
        serde_json::from_str(json)
    }

    /// Best identifier for logs and reports
    pub fn reference(&self) -> String {
        self.tx_hash
            .clone()
            .or_else(|| self.id.clone())
            .unwrap_or_else(|| self.timestamp.to_rfc3339())
    }
}
