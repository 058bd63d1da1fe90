//! Valuation module
//!
//! Per-leg YT pricing, points yield, volume-weighted aggregates and the
//! fair-value curve.

mod curve;
mod engine;
mod pipeline;
mod summary;
mod types;

pub use curve::{
    attach_curve, fair_value, hourly_grid, CurveAttachment, FairValueCurve, FairValuePoint,
    PricePoint,
};
pub use engine::{
    average_implied_apy, evaluate, hours_to_maturity, long_yield_apy, points, weighted_average,
    yt_price_ratio, AlignedLeg, EngineOutput, EnrichedLeg,
};
pub use pipeline::{align_legs, run, ValuationError, ValuationInputs, ValuationParams, ValuationResult};
pub use summary::ValuationSummary;
pub use types::{DegenerateMath, Metric, PointsParams, RowFault, HOURS_PER_YEAR};
