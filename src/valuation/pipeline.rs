//! Valuation pipeline
//!
//! One linear pass over immutable inputs:
//! merge history, expand transactions, align, evaluate, build the curve.

use super::curve::{attach_curve, CurveAttachment, FairValueCurve, PricePoint};
use super::engine::{evaluate, AlignedLeg, EnrichedLeg};
use super::summary::ValuationSummary;
use super::types::{Metric, PointsParams};
use crate::series::{
    align_backward_owned, merge_market_prices, sort_by_timestamp, AlignError, MarketSample, PriceSample,
};
use crate::source::AssetInfo;
use crate::telemetry::{record_latency, set_gauge, GaugeMetric, StageMetric};
use crate::transaction::{
    expand_batched, Expansion, ExpansionReport, TransactionLeg, TransactionRecord,
    DEFAULT_BATCH_SIZE,
};
use chrono::{DateTime, Utc};
use std::time::Instant;
use thiserror::Error;

/// Errors that abort a valuation run
#[derive(Debug, Error)]
pub enum ValuationError {
    #[error("market APY series is empty")]
    EmptyMarketSeries,
    #[error("YT price series is empty")]
    EmptyPriceSeries,
    #[error("no transaction legs to value")]
    NoTransactions,
    #[error(transparent)]
    Alignment(#[from] AlignError),
}

/// Everything fetched for one market
#[derive(Debug, Clone)]
pub struct ValuationInputs {
    pub asset: AssetInfo,
    /// Hourly APY history
    pub market: Vec<MarketSample>,
    /// Hourly YT OHLCV
    pub prices: Vec<PriceSample>,
    /// Raw transactions, any order
    pub transactions: Vec<TransactionRecord>,
}

/// Run parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuationParams {
    pub points: PointsParams,
    pub curve_attachment: CurveAttachment,
    /// Records per expansion batch
    pub batch_size: usize,
}

impl Default for ValuationParams {
    fn default() -> Self {
        Self {
            points: PointsParams::default(),
            curve_attachment: CurveAttachment::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Output of a valuation run
#[derive(Debug, Clone)]
pub struct ValuationResult {
    pub asset: AssetInfo,
    /// Enriched legs, timestamp ascending
    pub legs: Vec<EnrichedLeg>,
    /// APY history merged with prices and the fair value attached
    pub prices: Vec<PricePoint>,
    pub curve: FairValueCurve,
    pub avg_implied_apy: Metric,
    pub total_weighted_points: Metric,
    pub expansion: ExpansionReport,
}

impl ValuationResult {
    pub fn maturity(&self) -> DateTime<Utc> {
        self.asset.maturity
    }

    /// Hourly grid the curve was evaluated on
    pub fn grid(&self) -> Vec<DateTime<Utc>> {
        self.curve.grid()
    }

    /// Legs with at least one invalid per-row metric
    pub fn invalid_legs(&self) -> usize {
        self.legs.iter().filter(|l| !l.is_valid()).count()
    }

    pub fn summary(&self) -> ValuationSummary {
        ValuationSummary::from_result(self)
    }
}

/// Attach the as-of underlying APY to each leg, moving the legs
pub fn align_legs(
    legs: Vec<TransactionLeg>,
    market: &[MarketSample],
) -> Result<Vec<AlignedLeg>, AlignError> {
    align_backward_owned(legs, market, |leg, sample| AlignedLeg {
        leg,
        underlying_apy: sample.map(|s| s.underlying_apy),
    })
}

/// Value every transaction leg and build the fair-value curve
pub fn run(inputs: ValuationInputs, params: &ValuationParams) -> Result<ValuationResult, ValuationError> {
    let span = tracing::info_span!("valuation", symbol = %inputs.asset.symbol);
    let _enter = span.enter();

    let ValuationInputs {
        asset,
        market,
        prices,
        transactions,
    } = inputs;

    if market.is_empty() {
        return Err(ValuationError::EmptyMarketSeries);
    }
    if prices.is_empty() {
        return Err(ValuationError::EmptyPriceSeries);
    }

    let maturity = asset.maturity;
    set_gauge(GaugeMetric::MarketSamples, market.len() as f64);
    set_gauge(GaugeMetric::PriceSamples, prices.len() as f64);

    // Providers return history in request order; sort so the join preconditions hold
    let market = sort_by_timestamp(market);
    let prices = sort_by_timestamp(prices);

    let started = Instant::now();
    let merged = merge_market_prices(&market, &prices)?;
    record_latency(StageMetric::Merge, started.elapsed());

    let started = Instant::now();
    let Expansion { legs, report } = expand_batched(&transactions, params.batch_size);
    drop(transactions);
    record_latency(StageMetric::Expand, started.elapsed());

    let Some(first_leg) = legs.first() else {
        return Err(ValuationError::NoTransactions);
    };
    let curve_start = first_leg.timestamp;

    tracing::info!(
        records = report.records,
        legs = report.legs,
        duplicates = report.duplicates_removed,
        malformed = report.malformed.len(),
        "Expanded transactions"
    );
    set_gauge(GaugeMetric::TransactionLegs, report.legs as f64);
    set_gauge(GaugeMetric::DuplicateLegs, report.duplicates_removed as f64);
    set_gauge(GaugeMetric::MalformedItems, report.malformed.len() as f64);

    let started = Instant::now();
    let aligned = align_legs(legs, &market)?;
    record_latency(StageMetric::Align, started.elapsed());

    let started = Instant::now();
    let output = evaluate(aligned, maturity, &params.points);
    record_latency(StageMetric::Evaluate, started.elapsed());

    let started = Instant::now();
    let curve = FairValueCurve::generate(curve_start, maturity, output.avg_implied_apy);
    let prices = attach_curve(&merged, &curve, maturity, params.curve_attachment)?;
    record_latency(StageMetric::Curve, started.elapsed());

    let invalid_legs = output.legs.iter().filter(|l| !l.is_valid()).count();
    set_gauge(GaugeMetric::InvalidLegs, invalid_legs as f64);
    set_gauge(GaugeMetric::CurvePoints, curve.len() as f64);
    if let Some(apy) = output.avg_implied_apy.value() {
        set_gauge(GaugeMetric::AvgImpliedApy, apy);
    }
    if let Some(total) = output.total_weighted_points.value() {
        set_gauge(GaugeMetric::TotalWeightedPoints, total);
    }

    match curve.unavailable() {
        Some(fault) => tracing::warn!(%fault, "No fair value curve"),
        None => tracing::info!(
            legs = output.legs.len(),
            invalid_legs,
            curve_points = curve.len(),
            "Valuation complete"
        ),
    }

    Ok(ValuationResult {
        asset,
        legs: output.legs,
        prices,
        curve,
        avg_implied_apy: output.avg_implied_apy,
        total_weighted_points: output.total_weighted_points,
        expansion: report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::valuation::{DegenerateMath, RowFault};
    use chrono::{Duration, TimeZone};

    fn maturity() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap()
    }

    fn start() -> DateTime<Utc> {
        maturity() - Duration::days(10)
    }

    fn asset() -> AssetInfo {
        AssetInfo {
            address: "0xyt".to_string(),
            symbol: "YT-TEST".to_string(),
            maturity: maturity(),
        }
    }

    fn history(hours: i64) -> (Vec<MarketSample>, Vec<PriceSample>) {
        let market = (0..hours)
            .map(|h| MarketSample::new(start() + Duration::hours(h), 0.10, 0.08))
            .collect();
        let prices = (0..hours)
            .map(|h| {
                let c = 0.002 - h as f64 * 1e-6;
                PriceSample::new(start() + Duration::hours(h), c, c, c, c, 10.0)
            })
            .collect();
        (market, prices)
    }

    fn record(hours_after_start: i64, implied: f64, usd: f64) -> TransactionRecord {
        let json = format!(
            r#"{{
                "id": "tx-{h}",
                "txHash": "0x{h}",
                "timestamp": "{ts}",
                "action": "SWAP_YT",
                "market": {{"address": "0xmarket"}},
                "inputs": [{{"asset": {{"address": "0xsy", "baseType": "SY"}}, "amount": 1}}],
                "outputs": [{{"asset": {{"address": "0xyt", "baseType": "YT"}}, "amount": 5}}],
                "valuation": {{"usd": {usd}, "acc": 0.1}},
                "impliedApy": {implied}
            }}"#,
            h = hours_after_start,
            ts = (start() + Duration::hours(hours_after_start)).to_rfc3339(),
        );
        serde_json::from_str(&json).unwrap()
    }

    fn inputs(transactions: Vec<TransactionRecord>) -> ValuationInputs {
        let (market, prices) = history(48);
        ValuationInputs {
            asset: asset(),
            market,
            prices,
            transactions,
        }
    }

    #[test]
    fn test_run_values_every_leg() {
        let result = run(
            inputs(vec![record(30, 0.10, 200.0), record(5, 0.05, 100.0), record(12, 0.15, 100.0)]),
            &ValuationParams::default(),
        )
        .unwrap();

        assert_eq!(result.legs.len(), 3);
        assert!(result
            .legs
            .windows(2)
            .all(|w| w[0].leg.timestamp <= w[1].leg.timestamp));
        assert!((result.avg_implied_apy.value().unwrap() - 0.10).abs() < 1e-12);
        assert!(result.total_weighted_points.is_valid());
        assert!(result.legs.iter().all(|l| l.underlying_apy == Some(0.08)));

        // Curve starts at the earliest leg
        assert_eq!(result.curve.points[0].timestamp, start() + Duration::hours(5));
        assert_eq!(result.grid().last().copied(), Some(maturity()));
        assert_eq!(result.prices.len(), 48);
    }

    #[test]
    fn test_run_timestamp_attachment_leaves_prefix_empty() {
        let result = run(inputs(vec![record(5, 0.1, 100.0)]), &ValuationParams::default()).unwrap();

        let gap = Some(RowFault::AlignmentGap { field: "fairValue" });
        assert!(result.prices[..5].iter().all(|p| p.fair_value.fault() == gap));
        assert_eq!(
            result.prices[5].fair_value,
            Metric::Valid(result.curve.points[0].fair_value)
        );
    }

    #[test]
    fn test_run_positional_attachment() {
        let params = ValuationParams {
            curve_attachment: CurveAttachment::Positional,
            ..Default::default()
        };
        let result = run(inputs(vec![record(5, 0.1, 100.0)]), &params).unwrap();

        assert_eq!(
            result.prices[0].fair_value,
            Metric::Valid(result.curve.points[0].fair_value)
        );
    }

    #[test]
    fn test_run_fatal_errors() {
        let params = ValuationParams::default();

        let mut empty_market = inputs(vec![record(5, 0.1, 100.0)]);
        empty_market.market.clear();
        assert!(matches!(
            run(empty_market, &params),
            Err(ValuationError::EmptyMarketSeries)
        ));

        let mut empty_prices = inputs(vec![record(5, 0.1, 100.0)]);
        empty_prices.prices.clear();
        assert!(matches!(
            run(empty_prices, &params),
            Err(ValuationError::EmptyPriceSeries)
        ));

        assert!(matches!(
            run(inputs(Vec::new()), &params),
            Err(ValuationError::NoTransactions)
        ));
    }

    #[test]
    fn test_run_sorts_unordered_history() {
        let mut data = inputs(vec![record(5, 0.1, 100.0)]);
        data.market.reverse();
        data.prices.reverse();

        let result = run(data, &ValuationParams::default()).unwrap();
        assert!(result
            .prices
            .windows(2)
            .all(|w| w[0].point.sample.timestamp < w[1].point.sample.timestamp));
    }

    #[test]
    fn test_run_leg_before_history_has_alignment_gap() {
        let result = run(inputs(vec![record(-3, 0.1, 100.0)]), &ValuationParams::default()).unwrap();
        assert_eq!(result.legs[0].underlying_apy, None);
        assert_eq!(
            result.legs[0].long_yield_apy.fault(),
            Some(RowFault::AlignmentGap {
                field: "underlyingApy"
            })
        );
        // Still weighted into the average
        assert!(result.avg_implied_apy.is_valid());
    }

    #[test]
    fn test_run_zero_valuation_has_no_curve() {
        let result = run(inputs(vec![record(5, 0.1, 0.0)]), &ValuationParams::default()).unwrap();
        assert!(result.curve.is_empty());
        assert_eq!(
            result.avg_implied_apy.fault(),
            Some(RowFault::DegenerateMath(DegenerateMath::ZeroTotalValuation))
        );
        assert!(result.prices.iter().all(|p| !p.fair_value.is_valid()));
    }

    #[test]
    fn test_run_batch_size_does_not_change_result() {
        let transactions = vec![
            record(30, 0.10, 200.0),
            record(5, 0.05, 100.0),
            record(5, 0.05, 100.0),
            record(12, 0.15, 100.0),
            record(-3, 0.12, 50.0),
        ];
        let single = ValuationParams {
            batch_size: 1,
            ..Default::default()
        };

        let small = run(inputs(transactions.clone()), &single).unwrap();
        let large = run(inputs(transactions), &ValuationParams::default()).unwrap();

        assert_eq!(small.legs, large.legs);
        assert_eq!(small.prices, large.prices);
        assert_eq!(small.curve, large.curve);
        assert_eq!(small.avg_implied_apy, large.avg_implied_apy);
        assert_eq!(small.total_weighted_points, large.total_weighted_points);
        assert_eq!(small.expansion, large.expansion);
        assert_eq!(small.expansion.duplicates_removed, 1);
        assert_eq!(small.legs.len(), 4);
    }

    #[test]
    fn test_invalid_legs_shared_by_summary() {
        // Leg before history: yt price valid, long-yield APY has an alignment gap
        let result = run(
            inputs(vec![record(-3, 0.1, 100.0), record(5, 0.1, 100.0)]),
            &ValuationParams::default(),
        )
        .unwrap();

        assert!(result.legs[0].yt_price.is_valid());
        assert!(!result.legs[0].is_valid());
        assert_eq!(result.invalid_legs(), 1);
        assert_eq!(result.summary().invalid_legs, 1);
    }
}
