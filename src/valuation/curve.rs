//! Fair-value curve
//!
//! Present value of the yield stream under a constant average implied APY:
//! `fair(t) = 1 - 1 / (1 + apy)^(hours_to_maturity(t) / 8760)`.
//! The curve is zero at maturity and rises as the horizon lengthens.

use super::engine::hours_to_maturity;
use super::types::{DegenerateMath, Metric, RowFault, HOURS_PER_YEAR};
use crate::series::{align_backward_within, AlignError, MarketPoint, Timestamped};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Fair value for a given horizon and APY
pub fn fair_value(hours: f64, avg_implied_apy: f64) -> f64 {
    1.0 - 1.0 / (1.0 + avg_implied_apy).powf(hours / HOURS_PER_YEAR)
}

/// Hourly timestamps from `start` up to and including `maturity`
///
/// Steps are anchored at `start`; when the last step falls short of
/// maturity, maturity itself closes the grid. Empty when `start` is after
/// maturity.
pub fn hourly_grid(start: DateTime<Utc>, maturity: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let mut grid = Vec::new();
    let mut t = start;
    while t <= maturity {
        grid.push(t);
        t += Duration::hours(1);
    }
    if grid.last().is_some_and(|last| *last < maturity) {
        grid.push(maturity);
    }
    grid
}

/// One point of the curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FairValuePoint {
    pub timestamp: DateTime<Utc>,
    pub hours_to_maturity: f64,
    pub fair_value: f64,
}

impl Timestamped for FairValuePoint {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Hourly fair-value curve to maturity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FairValueCurve {
    /// APY the curve was built from
    pub avg_implied_apy: Metric,
    pub points: Vec<FairValuePoint>,
}

impl FairValueCurve {
    /// Build the curve from `start` to `maturity`
    ///
    /// With no usable average APY the curve is empty and carries the cause.
    pub fn generate(start: DateTime<Utc>, maturity: DateTime<Utc>, avg_implied_apy: Metric) -> Self {
        let avg_implied_apy = avg_implied_apy.and_then(|apy| {
            if apy <= -1.0 {
                Metric::invalid(DegenerateMath::NonFinite)
            } else {
                Metric::Valid(apy)
            }
        });

        let points = match avg_implied_apy {
            Metric::Valid(apy) => hourly_grid(start, maturity)
                .into_iter()
                .map(|timestamp| {
                    let hours = hours_to_maturity(maturity, timestamp);
                    FairValuePoint {
                        timestamp,
                        hours_to_maturity: hours,
                        fair_value: fair_value(hours, apy),
                    }
                })
                .collect(),
            Metric::Invalid(_) => Vec::new(),
        };

        tracing::debug!(points = points.len(), %start, %maturity, "Generated fair value curve");

        Self {
            avg_implied_apy,
            points,
        }
    }

    /// The hourly grid behind the curve
    pub fn grid(&self) -> Vec<DateTime<Utc>> {
        self.points.iter().map(|p| p.timestamp).collect()
    }

    /// Why the curve has no points, if it was never built
    pub fn unavailable(&self) -> Option<RowFault> {
        self.avg_implied_apy.fault()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

/// How the curve is matched to the price series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveAttachment {
    /// i-th curve point to the i-th price row, truncated to the shorter length
    Positional,
    /// Latest grid point at or before the row, within one grid step
    #[default]
    Timestamp,
}

/// A market point with the fair value attached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    #[serde(flatten)]
    pub point: MarketPoint,
    pub fair_value: Metric,
}

impl PricePoint {
    /// YT close below fair value
    pub fn below_fair(&self) -> Option<bool> {
        let close = self.point.price.as_ref()?.close;
        self.fair_value.value().map(|fair| close < fair)
    }
}

impl Timestamped for PricePoint {
    fn timestamp(&self) -> DateTime<Utc> {
        self.point.timestamp()
    }
}

const FAIR_VALUE: &str = "fairValue";

/// Attach the curve to the price series under `policy`
pub fn attach_curve(
    series: &[MarketPoint],
    curve: &FairValueCurve,
    maturity: DateTime<Utc>,
    policy: CurveAttachment,
) -> Result<Vec<PricePoint>, AlignError> {
    if let Some(fault) = curve.unavailable() {
        return Ok(series
            .iter()
            .map(|point| PricePoint {
                point: point.clone(),
                fair_value: Metric::Invalid(fault),
            })
            .collect());
    }

    let gap = Metric::invalid(RowFault::AlignmentGap { field: FAIR_VALUE });

    match policy {
        CurveAttachment::Positional => Ok(series
            .iter()
            .enumerate()
            .map(|(i, point)| PricePoint {
                point: point.clone(),
                fair_value: curve
                    .points
                    .get(i)
                    .map(|p| Metric::Valid(p.fair_value))
                    .unwrap_or(gap),
            })
            .collect()),
        CurveAttachment::Timestamp => {
            align_backward_within(series, &curve.points, Duration::hours(1), |point, grid| {
                let fair_value = if point.timestamp() > maturity {
                    Metric::invalid(DegenerateMath::PostMaturity)
                } else {
                    grid.map(|g| Metric::Valid(g.fair_value)).unwrap_or(gap)
                };
                PricePoint {
                    point: point.clone(),
                    fair_value,
                }
            })
        }
    }
}
