//! Per-row valuation and volume-weighted aggregates
//!
//! Compounding follows a constant-APY assumption over an 8760-hour year:
//! - YT/underlying = (1 + implied)^(h / 8760) - 1
//! - long-yield APY = (underlying / implied)^(8760 / h) - 1
//! - points = h * rate * amount * multiplier / price

use super::curve::fair_value;
use super::types::{DegenerateMath, Metric, PointsParams, RowFault, HOURS_PER_YEAR};
use crate::series::Timestamped;
use crate::transaction::TransactionLeg;
use chrono::{DateTime, Utc};
use serde::Serialize;

const UNDERLYING_APY: &str = "underlyingApy";
const IMPLIED_APY: &str = "impliedApy";
const VALUATION_USD: &str = "valuation.usd";

/// A leg with the as-of underlying APY attached
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedLeg {
    pub leg: TransactionLeg,
    /// `None` when no market sample precedes the leg
    pub underlying_apy: Option<f64>,
}

impl Timestamped for AlignedLeg {
    fn timestamp(&self) -> DateTime<Utc> {
        self.leg.timestamp
    }
}

/// A leg with every derived metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedLeg {
    #[serde(flatten)]
    pub leg: TransactionLeg,
    pub underlying_apy: Option<f64>,
    pub hours_to_maturity: f64,
    /// YT price in units of underlying
    pub yt_price: Metric,
    pub long_yield_apy: Metric,
    pub points: Metric,
    pub weighted_points: Metric,
    /// Fair value at this leg's time under the weighted average implied APY
    pub fair_value: Metric,
}

impl EnrichedLeg {
    /// Every per-row metric computed; the fair value depends on the run-wide
    /// average and is not counted
    pub fn is_valid(&self) -> bool {
        self.yt_price.is_valid()
            && self.long_yield_apy.is_valid()
            && self.points.is_valid()
            && self.weighted_points.is_valid()
    }

    /// YT traded below the fair-value curve
    pub fn below_fair(&self) -> Option<bool> {
        match (self.yt_price.value(), self.fair_value.value()) {
            (Some(price), Some(fair)) => Some(price < fair),
            _ => None,
        }
    }
}

/// Engine output
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub legs: Vec<EnrichedLeg>,
    /// Volume-weighted average implied APY
    pub avg_implied_apy: Metric,
    /// Sum of volume-weighted points
    pub total_weighted_points: Metric,
}

/// Hours from `timestamp` until `maturity`; negative after maturity
pub fn hours_to_maturity(maturity: DateTime<Utc>, timestamp: DateTime<Utc>) -> f64 {
    (maturity - timestamp).num_milliseconds() as f64 / 3_600_000.0
}

/// YT price relative to its underlying; exactly zero at maturity
pub fn yt_price_ratio(implied_apy: f64, hours: f64) -> Metric {
    if hours < 0.0 {
        return Metric::invalid(DegenerateMath::PostMaturity);
    }
    Metric::checked((1.0 + implied_apy).powf(hours / HOURS_PER_YEAR) - 1.0)
}

/// Annualized excess of underlying yield over implied yield
pub fn long_yield_apy(implied_apy: f64, underlying_apy: Option<f64>, hours: f64) -> Metric {
    let Some(underlying_apy) = underlying_apy else {
        return Metric::invalid(RowFault::AlignmentGap {
            field: UNDERLYING_APY,
        });
    };
    if hours < 0.0 {
        return Metric::invalid(DegenerateMath::PostMaturity);
    }
    if hours == 0.0 {
        return Metric::invalid(DegenerateMath::ZeroHoursToMaturity);
    }
    if implied_apy == 0.0 {
        return Metric::invalid(DegenerateMath::ZeroImpliedApy);
    }

    let ratio = 1.0 + (underlying_apy - implied_apy) / implied_apy;
    Metric::checked(ratio.powf(HOURS_PER_YEAR / hours) - 1.0)
}

/// Points earned by buying YT at `price` and holding to maturity
pub fn points(price: Metric, hours: f64, params: &PointsParams) -> Metric {
    price.and_then(|price| {
        if price <= 0.0 {
            return Metric::invalid(DegenerateMath::NonPositivePrice);
        }
        Metric::checked(
            (1.0 / price)
                * hours
                * params.points_per_hour
                * params.underlying_amount
                * params.multiplier,
        )
    })
}

/// `Σ(value_i × weight_i) / Σ weight_i`
pub fn weighted_average(pairs: impl IntoIterator<Item = (f64, f64)>) -> Metric {
    let (weighted, total) = pairs
        .into_iter()
        .fold((0.0, 0.0), |(acc, total), (value, weight)| {
            (acc + value * weight, total + weight)
        });

    if total == 0.0 {
        return Metric::invalid(DegenerateMath::ZeroTotalValuation);
    }
    Metric::checked(weighted / total)
}

struct RowMetrics {
    hours: f64,
    yt_price: Metric,
    long_yield_apy: Metric,
    points: Metric,
}

fn row_metrics(row: &AlignedLeg, maturity: DateTime<Utc>, params: &PointsParams) -> RowMetrics {
    let hours = hours_to_maturity(maturity, row.leg.timestamp);

    match row.leg.implied_apy {
        Some(implied) => {
            let yt_price = yt_price_ratio(implied, hours);
            RowMetrics {
                hours,
                yt_price,
                long_yield_apy: long_yield_apy(implied, row.underlying_apy, hours),
                points: points(yt_price, hours, params),
            }
        }
        None => {
            let missing = Metric::invalid(RowFault::MalformedRecord { field: IMPLIED_APY });
            RowMetrics {
                hours,
                yt_price: missing,
                long_yield_apy: missing,
                points: missing,
            }
        }
    }
}

/// Volume-weighted average implied APY over legs that are not past maturity
pub fn average_implied_apy(rows: &[AlignedLeg], maturity: DateTime<Utc>) -> Metric {
    weighted_average(rows.iter().filter_map(|row| {
        let leg = &row.leg;
        if hours_to_maturity(maturity, leg.timestamp) < 0.0 {
            return None;
        }
        match (leg.implied_apy, leg.valuation_usd) {
            (Some(apy), Some(usd)) if apy.is_finite() && usd.is_finite() => Some((apy, usd)),
            _ => None,
        }
    }))
}

/// Compute every per-row metric and both weighted aggregates
///
/// Consumes the aligned rows; each leg moves into its enriched row.
pub fn evaluate(rows: Vec<AlignedLeg>, maturity: DateTime<Utc>, params: &PointsParams) -> EngineOutput {
    let metrics: Vec<RowMetrics> = rows
        .iter()
        .map(|row| row_metrics(row, maturity, params))
        .collect();

    let avg_implied_apy = average_implied_apy(&rows, maturity);

    // Points weights cover only legs whose points are valid
    let point_weight_total: f64 = rows
        .iter()
        .zip(&metrics)
        .filter(|(_, m)| m.points.is_valid())
        .filter_map(|(row, _)| row.leg.valuation_usd)
        .sum();

    let legs: Vec<EnrichedLeg> = rows
        .into_iter()
        .zip(metrics)
        .map(|(row, m)| {
            let weighted_points = m.points.and_then(|p| match row.leg.valuation_usd {
                None => Metric::invalid(RowFault::MalformedRecord {
                    field: VALUATION_USD,
                }),
                Some(_) if point_weight_total == 0.0 => {
                    Metric::invalid(DegenerateMath::ZeroTotalValuation)
                }
                Some(usd) => Metric::checked(p * usd / point_weight_total),
            });
            let fair = if m.hours < 0.0 {
                Metric::invalid(DegenerateMath::PostMaturity)
            } else {
                avg_implied_apy.and_then(|apy| Metric::checked(fair_value(m.hours, apy)))
            };

            EnrichedLeg {
                leg: row.leg,
                underlying_apy: row.underlying_apy,
                hours_to_maturity: m.hours,
                yt_price: m.yt_price,
                long_yield_apy: m.long_yield_apy,
                points: m.points,
                weighted_points,
                fair_value: fair,
            }
        })
        .collect();

    let total_weighted_points = if point_weight_total == 0.0 {
        Metric::invalid(DegenerateMath::ZeroTotalValuation)
    } else {
        Metric::checked(legs.iter().filter_map(|l| l.weighted_points.value()).sum())
    };

    let invalid_points = legs.iter().filter(|l| !l.points.is_valid()).count();
    tracing::debug!(
        legs = legs.len(),
        invalid_points,
        avg_implied_apy = ?avg_implied_apy.value(),
        total_weighted_points = ?total_weighted_points.value(),
        "Evaluated legs"
    );

    EngineOutput {
        legs,
        avg_implied_apy,
        total_weighted_points,
    }
}
