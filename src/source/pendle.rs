//! Pendle REST API client
//!
//! Hourly APY history, YT OHLCV, market transactions and the asset list of
//! one chain. Rate limits and server errors are retried with exponential
//! backoff.

use super::{AssetInfo, AssetResolver, MarketDataSource, Network, SourceError, TransactionFilter};
use crate::series::{MarketSample, PriceSample};
use crate::transaction::TransactionRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Pendle core API base URL
pub const PENDLE_API_URL: &str = "https://api-v2.pendle.finance/core";

/// Configuration for the Pendle client
#[derive(Debug, Clone)]
pub struct PendleConfig {
    /// Base URL for the Pendle API
    pub base_url: String,
    pub network: Network,
    /// Market contract address
    pub market: String,
    /// YT contract address
    pub yt: String,
    /// Request timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First retry delay; doubles per attempt
    pub backoff_base: Duration,
    /// Transactions per page
    pub page_limit: usize,
    /// Pause between transaction pages
    pub page_delay: Duration,
}

impl Default for PendleConfig {
    fn default() -> Self {
        Self {
            base_url: PENDLE_API_URL.to_string(),
            network: Network::Ethereum,
            market: String::new(),
            yt: String::new(),
            timeout: Duration::from_secs(30),
            max_retries: 5,
            backoff_base: Duration::from_millis(500),
            page_limit: 1000,
            page_delay: Duration::from_millis(250),
        }
    }
}

/// Client for Pendle's core API
pub struct PendleClient {
    config: PendleConfig,
    client: Client,
}

impl PendleClient {
    /// Create a new client with custom configuration
    pub fn with_config(config: PendleConfig) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &PendleConfig {
        &self.config
    }

    fn chain_url(&self, version: &str, path: &str) -> String {
        format!(
            "{}/{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            version,
            self.config.network.chain_id(),
            path
        )
    }

    /// GET a JSON document, retrying rate limits, server errors and timeouts
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let mut attempt = 0u32;

        loop {
            let reason = match self.client.get(url).query(query).send().await {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<T>()
                        .await
                        .map_err(|e| SourceError::Decode(e.to_string()));
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    if !is_retryable(status) || attempt >= self.config.max_retries {
                        return Err(SourceError::Api {
                            status: status.as_u16(),
                            body,
                        });
                    }
                    format!("status {}", status)
                }
                Err(e) => {
                    if !(e.is_timeout() || e.is_connect()) || attempt >= self.config.max_retries {
                        return Err(SourceError::Http(e));
                    }
                    e.to_string()
                }
            };

            let delay = backoff_delay(self.config.backoff_base, attempt);
            tracing::warn!(
                url,
                attempt,
                reason = %reason,
                delay_ms = delay.as_millis() as u64,
                "Retrying Pendle API request"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Hourly implied/underlying APY history of the market
    pub async fn fetch_apy_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MarketSample>, SourceError> {
        let url = self.chain_url(
            "v1",
            &format!("markets/{}/apy-history-1ma", self.config.market),
        );
        tracing::debug!(url = %url, "Fetching APY history");

        let response: CsvResponse = self
            .get_json(&url, &history_query(start, end))
            .await?;
        parse_apy_csv(&response.results)
    }

    /// Hourly OHLCV of the YT
    pub async fn fetch_ohlcv(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceSample>, SourceError> {
        let url = self.chain_url("v3", &format!("prices/{}/ohlcv", self.config.yt));
        tracing::debug!(url = %url, "Fetching YT OHLCV");

        let response: OhlcvResponse = self
            .get_json(&url, &history_query(start, end))
            .await?;
        Ok(response.results.into_iter().map(PriceSample::from).collect())
    }

    /// All market transactions, paging until an empty page
    pub async fn fetch_all_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, SourceError> {
        let url = self.chain_url("v3", "transactions");
        let limit = self.config.page_limit.max(1);
        let mut records = Vec::new();
        let mut skip = 0usize;

        loop {
            let mut query = vec![
                ("market", self.config.market.clone()),
                ("skip", skip.to_string()),
                ("limit", limit.to_string()),
            ];
            if !filter.actions.is_empty() {
                query.push(("action", filter.actions.join(",")));
            }
            if !filter.origins.is_empty() {
                query.push(("origin", filter.origins.join(",")));
            }
            if filter.min_value > 0.0 {
                query.push(("minValue", filter.min_value.to_string()));
            }

            let page: TransactionPage = self.get_json(&url, &query).await?;
            let count = page.results.len();
            tracing::debug!(skip, count, "Fetched transaction page");

            if count == 0 {
                break;
            }
            records.extend(page.results.into_iter().filter(|r| filter.matches(r)));
            skip += count;

            if !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }
        }

        tracing::info!(transactions = records.len(), "Fetched transactions");
        Ok(records)
    }

    /// All assets listed on the chain
    pub async fn fetch_assets(&self) -> Result<Vec<PendleAsset>, SourceError> {
        let url = self.chain_url("v1", "assets/all");
        self.get_json(&url, &[]).await
    }
}

#[async_trait]
impl MarketDataSource for PendleClient {
    async fn fetch_history(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<(Vec<MarketSample>, Vec<PriceSample>), SourceError> {
        tokio::try_join!(self.fetch_apy_history(start, end), self.fetch_ohlcv(start, end))
    }

    async fn fetch_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, SourceError> {
        self.fetch_all_transactions(filter).await
    }
}

#[async_trait]
impl AssetResolver for PendleClient {
    async fn resolve_asset(&self, base_type: &str, address: &str) -> Result<AssetInfo, SourceError> {
        let assets = self.fetch_assets().await?;
        select_asset(assets, base_type, address)
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Timestamp format accepted by the history endpoints
fn format_api_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn history_query(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<(&'static str, String)> {
    vec![
        ("time_frame", "hour".to_string()),
        ("timestamp_start", format_api_time(start)),
        ("timestamp_end", format_api_time(end)),
    ]
}

/// Response wrapping a CSV document
#[derive(Debug, Deserialize)]
struct CsvResponse {
    results: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApyRow {
    /// Unix seconds
    timestamp: i64,
    underlying_apy: f64,
    implied_apy: f64,
}

/// Parse the APY CSV (`timestamp,underlyingApy,impliedApy,...`)
fn parse_apy_csv(body: &str) -> Result<Vec<MarketSample>, SourceError> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());

    reader
        .deserialize::<ApyRow>()
        .map(|row| {
            let row = row.map_err(|e| SourceError::Decode(format!("APY CSV: {}", e)))?;
            let timestamp = DateTime::from_timestamp(row.timestamp, 0).ok_or_else(|| {
                SourceError::Decode(format!("APY CSV: timestamp {} out of range", row.timestamp))
            })?;
            Ok(MarketSample::new(timestamp, row.implied_apy, row.underlying_apy))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct OhlcvResponse {
    results: Vec<OhlcvBar>,
}

#[derive(Debug, Deserialize)]
struct OhlcvBar {
    time: DateTime<Utc>,
    #[serde(deserialize_with = "number_or_string")]
    open: f64,
    #[serde(deserialize_with = "number_or_string")]
    high: f64,
    #[serde(deserialize_with = "number_or_string")]
    low: f64,
    #[serde(deserialize_with = "number_or_string")]
    close: f64,
    #[serde(default, deserialize_with = "number_or_string")]
    volume: f64,
}

impl From<OhlcvBar> for PriceSample {
    fn from(bar: OhlcvBar) -> Self {
        PriceSample::new(bar.time, bar.open, bar.high, bar.low, bar.close, bar.volume)
    }
}

/// Prices arrive as JSON numbers or numeric strings
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
struct TransactionPage {
    #[serde(default)]
    results: Vec<TransactionRecord>,
}

/// Entry of the asset list
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendleAsset {
    pub address: String,
    #[serde(default)]
    pub symbol: String,
    pub base_type: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

/// Find the asset with the given base type and address
fn select_asset(
    assets: Vec<PendleAsset>,
    base_type: &str,
    address: &str,
) -> Result<AssetInfo, SourceError> {
    let not_found = || SourceError::AssetNotFound {
        base_type: base_type.to_string(),
        address: address.to_string(),
    };
    let address = address.to_lowercase();

    let asset = assets
        .into_iter()
        .find(|a| a.base_type.as_deref() == Some(base_type) && a.address.to_lowercase() == address)
        .ok_or_else(not_found)?;
    let maturity = asset.expiry.ok_or_else(not_found)?;

    Ok(AssetInfo {
        address: asset.address,
        symbol: asset.symbol,
        maturity,
    })
}
