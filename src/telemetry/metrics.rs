//! Pipeline metrics
//!
//! Recorded through the `metrics` facade; without an installed recorder the
//! calls are no-ops.

use std::time::Duration;

/// Pipeline stages with latency histograms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMetric {
    /// Provider fetch of all input series
    Fetch,
    /// APY and price history merge
    Merge,
    /// Transaction expansion
    Expand,
    /// Underlying APY attachment to legs
    Align,
    /// Per-leg metrics and aggregates
    Evaluate,
    /// Curve generation and attachment
    Curve,
    /// Parquet export
    Export,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaugeMetric {
    MarketSamples,
    PriceSamples,
    TransactionLegs,
    DuplicateLegs,
    MalformedItems,
    /// Legs with at least one invalid metric
    InvalidLegs,
    AvgImpliedApy,
    TotalWeightedPoints,
    CurvePoints,
}

impl StageMetric {
    fn name(&self) -> &'static str {
        match self {
            StageMetric::Fetch => "ytfv_fetch_latency_ms",
            StageMetric::Merge => "ytfv_merge_latency_ms",
            StageMetric::Expand => "ytfv_expand_latency_ms",
            StageMetric::Align => "ytfv_align_latency_ms",
            StageMetric::Evaluate => "ytfv_evaluate_latency_ms",
            StageMetric::Curve => "ytfv_curve_latency_ms",
            StageMetric::Export => "ytfv_export_latency_ms",
        }
    }
}

impl GaugeMetric {
    fn name(&self) -> &'static str {
        match self {
            GaugeMetric::MarketSamples => "ytfv_market_samples",
            GaugeMetric::PriceSamples => "ytfv_price_samples",
            GaugeMetric::TransactionLegs => "ytfv_transaction_legs",
            GaugeMetric::DuplicateLegs => "ytfv_duplicate_legs",
            GaugeMetric::MalformedItems => "ytfv_malformed_items",
            GaugeMetric::InvalidLegs => "ytfv_invalid_legs",
            GaugeMetric::AvgImpliedApy => "ytfv_avg_implied_apy",
            GaugeMetric::TotalWeightedPoints => "ytfv_total_weighted_points",
            GaugeMetric::CurvePoints => "ytfv_curve_points",
        }
    }
}

/// Record a stage latency measurement
pub fn record_latency(metric: StageMetric, duration: Duration) {
    let metric_name = metric.name();
    let value_ms = duration.as_secs_f64() * 1000.0;

    metrics::histogram!(metric_name).record(value_ms);
    tracing::debug!(metric = metric_name, value_ms, "Recording latency");
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = metric.name();

    metrics::gauge!(metric_name).set(value);
    tracing::debug!(metric = metric_name, value, "Setting gauge");
}
