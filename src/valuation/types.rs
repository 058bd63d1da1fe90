//! Valuation types
//!
//! Derived per-row values are either a finite number or the recorded reason
//! they could not be computed.

use serde::Serialize;
use thiserror::Error;

/// Hours in a (non-leap) year, the compounding basis for all APY math
pub const HOURS_PER_YEAR: f64 = 8760.0;

/// Arithmetic that has no meaningful result for a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Error)]
pub enum DegenerateMath {
    /// Row is after maturity
    #[error("row is past maturity")]
    PostMaturity,
    /// Zero hours to maturity used as a divisor
    #[error("zero hours to maturity")]
    ZeroHoursToMaturity,
    /// Implied APY of zero used as a divisor
    #[error("implied APY is zero")]
    ZeroImpliedApy,
    /// YT/underlying price is zero or negative
    #[error("non-positive price ratio")]
    NonPositivePrice,
    /// Weighting population has zero total valuation
    #[error("total valuation is zero")]
    ZeroTotalValuation,
    /// Result overflowed or left the real domain
    #[error("non-finite result")]
    NonFinite,
}

/// Why a derived value is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Error)]
pub enum RowFault {
    /// Record lacks a field the computation needs
    #[error("malformed record: missing {field}")]
    MalformedRecord { field: &'static str },
    /// No preceding sample to join against
    #[error("alignment gap: no {field} at or before row")]
    AlignmentGap { field: &'static str },
    #[error("degenerate math: {0}")]
    DegenerateMath(DegenerateMath),
}

impl From<DegenerateMath> for RowFault {
    fn from(kind: DegenerateMath) -> Self {
        RowFault::DegenerateMath(kind)
    }
}

/// A derived value with its validity
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum Metric {
    Valid(f64),
    Invalid(RowFault),
}

impl Metric {
    /// Wrap a computed number, rejecting NaN and infinities
    pub fn checked(value: f64) -> Self {
        if value.is_finite() {
            Metric::Valid(value)
        } else {
            Metric::Invalid(DegenerateMath::NonFinite.into())
        }
    }

    pub fn invalid(fault: impl Into<RowFault>) -> Self {
        Metric::Invalid(fault.into())
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Metric::Valid(v) => Some(*v),
            Metric::Invalid(_) => None,
        }
    }

    pub fn fault(&self) -> Option<RowFault> {
        match self {
            Metric::Valid(_) => None,
            Metric::Invalid(fault) => Some(*fault),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Metric::Valid(_))
    }

    /// Chain a computation that needs this value
    pub fn and_then(self, f: impl FnOnce(f64) -> Metric) -> Metric {
        match self {
            Metric::Valid(v) => f(v),
            invalid => invalid,
        }
    }
}

/// Points program parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointsParams {
    /// Points per hour per unit of underlying
    pub points_per_hour: f64,
    /// Units of underlying held
    pub underlying_amount: f64,
    /// Protocol boost for YT holders
    pub multiplier: f64,
}

impl Default for PointsParams {
    fn default() -> Self {
        Self {
            points_per_hour: 0.04,
            underlying_amount: 1.0,
            multiplier: 5.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_rejects_nan_and_inf() {
        assert_eq!(Metric::checked(0.5), Metric::Valid(0.5));
        assert_eq!(
            Metric::checked(f64::NAN).fault(),
            Some(RowFault::DegenerateMath(DegenerateMath::NonFinite))
        );
        assert!(!Metric::checked(f64::INFINITY).is_valid());
    }

    #[test]
    fn test_and_then_propagates_fault() {
        let fault = RowFault::AlignmentGap {
            field: "underlyingApy",
        };
        let chained = Metric::Invalid(fault).and_then(|v| Metric::Valid(v * 2.0));
        assert_eq!(chained.fault(), Some(fault));

        let doubled = Metric::Valid(2.0).and_then(|v| Metric::Valid(v * 2.0));
        assert_eq!(doubled.value(), Some(4.0));
    }

    #[test]
    fn test_fault_display() {
        let fault: RowFault = DegenerateMath::ZeroImpliedApy.into();
        assert_eq!(fault.to_string(), "degenerate math: implied APY is zero");

        let gap = RowFault::MalformedRecord {
            field: "valuation.usd",
        };
        assert_eq!(gap.to_string(), "malformed record: missing valuation.usd");
    }

    #[test]
    fn test_metric_serializes_tagged() {
        let json = serde_json::to_string(&Metric::Valid(0.25)).unwrap();
        assert_eq!(json, r#"{"status":"valid","value":0.25}"#);

        let json = serde_json::to_string(&Metric::invalid(DegenerateMath::PostMaturity)).unwrap();
        assert_eq!(
            json,
            r#"{"status":"invalid","value":{"DegenerateMath":"PostMaturity"}}"#
        );
    }
}
