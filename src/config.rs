//! Configuration types for yt-fair-value

use crate::source::{Network, PendleConfig, TransactionFilter, PENDLE_API_URL};
use crate::telemetry::LogFormat;
use crate::transaction::DEFAULT_BATCH_SIZE;
use crate::valuation::{CurveAttachment, PointsParams, ValuationParams};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub market: MarketConfig,
    #[serde(default)]
    pub points: PointsConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub valuation: ValuationConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Market selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    pub network: Network,
    /// Market contract address
    pub market: String,
    /// YT contract address
    pub yt: String,
    /// Start of the history window
    pub start: DateTime<Utc>,
    /// End of the history window; now when absent
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default = "default_actions")]
    pub actions: Vec<String>,
    #[serde(default = "default_origins")]
    pub origins: Vec<String>,
    /// Minimum USD notional of a transaction
    #[serde(default)]
    pub min_value: Decimal,
}

fn default_actions() -> Vec<String> {
    TransactionFilter::default().actions
}
fn default_origins() -> Vec<String> {
    TransactionFilter::default().origins
}

/// Points program parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsConfig {
    #[serde(default = "default_points_per_hour")]
    pub points_per_hour: Decimal,
    #[serde(default = "default_underlying_amount")]
    pub underlying_amount: Decimal,
    #[serde(default = "default_multiplier")]
    pub multiplier: Decimal,
}

fn default_points_per_hour() -> Decimal {
    Decimal::new(4, 2) // 0.04
}
fn default_underlying_amount() -> Decimal {
    Decimal::ONE
}
fn default_multiplier() -> Decimal {
    Decimal::new(5, 0)
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            points_per_hour: Decimal::new(4, 2),
            underlying_amount: Decimal::ONE,
            multiplier: Decimal::new(5, 0),
        }
    }
}

impl PointsConfig {
    pub fn to_params(&self) -> anyhow::Result<PointsParams> {
        let to_f64 = |name: &str, value: Decimal| {
            value
                .to_f64()
                .ok_or_else(|| anyhow::anyhow!("points.{} is not representable: {}", name, value))
        };

        Ok(PointsParams {
            points_per_hour: to_f64("points_per_hour", self.points_per_hour)?,
            underlying_amount: to_f64("underlying_amount", self.underlying_amount)?,
            multiplier: to_f64("multiplier", self.multiplier)?,
        })
    }
}

/// Pendle API client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Transactions per page
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,
    /// Pause between transaction pages
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
}

fn default_base_url() -> String {
    PENDLE_API_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}
fn default_backoff_ms() -> u64 {
    500
}
fn default_page_limit() -> usize {
    1000
}
fn default_page_delay_ms() -> u64 {
    250
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: PENDLE_API_URL.to_string(),
            timeout_secs: 30,
            max_retries: 5,
            backoff_ms: 500,
            page_limit: 1000,
            page_delay_ms: 250,
        }
    }
}

/// Valuation pass settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationConfig {
    #[serde(default)]
    pub curve_attachment: CurveAttachment,
    /// Records per expansion batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            curve_attachment: CurveAttachment::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// Write Parquet files of legs, prices and curve
    #[serde(default = "default_true")]
    pub parquet: bool,
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}
fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./output"),
            parquet: true,
            format: OutputFormat::Table,
        }
    }
}

/// Summary format on stdout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.market.market.is_empty() {
            anyhow::bail!("market.market must be set");
        }
        if self.market.yt.is_empty() {
            anyhow::bail!("market.yt must be set");
        }
        if let Some(end) = self.market.end {
            if end <= self.market.start {
                anyhow::bail!("market.end must be after market.start");
            }
        }
        if self.market.min_value.is_sign_negative() {
            anyhow::bail!("market.min_value must not be negative");
        }
        if self.points.points_per_hour.is_sign_negative() {
            anyhow::bail!("points.points_per_hour must not be negative");
        }
        if self.points.underlying_amount <= Decimal::ZERO {
            anyhow::bail!("points.underlying_amount must be positive");
        }
        if self.points.multiplier <= Decimal::ZERO {
            anyhow::bail!("points.multiplier must be positive");
        }
        if self.valuation.batch_size == 0 {
            anyhow::bail!("valuation.batch_size must be positive");
        }
        if self.api.page_limit == 0 {
            anyhow::bail!("api.page_limit must be positive");
        }
        Ok(())
    }

    pub fn valuation_params(&self) -> anyhow::Result<ValuationParams> {
        Ok(ValuationParams {
            points: self.points.to_params()?,
            curve_attachment: self.valuation.curve_attachment,
            batch_size: self.valuation.batch_size,
        })
    }

    pub fn pendle_config(&self) -> PendleConfig {
        PendleConfig {
            base_url: self.api.base_url.clone(),
            network: self.market.network,
            market: self.market.market.clone(),
            yt: self.market.yt.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
            max_retries: self.api.max_retries,
            backoff_base: Duration::from_millis(self.api.backoff_ms),
            page_limit: self.api.page_limit,
            page_delay: Duration::from_millis(self.api.page_delay_ms),
        }
    }

    pub fn transaction_filter(&self) -> TransactionFilter {
        TransactionFilter {
            actions: self.market.actions.clone(),
            origins: self.market.origins.clone(),
            min_value: self.market.min_value.to_f64().unwrap_or(0.0),
        }
    }
}
