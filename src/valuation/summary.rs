//! Valuation summary and reporting

use super::pipeline::ValuationResult;
use super::types::Metric;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Headline numbers of a valuation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationSummary {
    pub symbol: String,
    pub maturity: DateTime<Utc>,
    /// Raw transaction records
    pub records: usize,
    /// Legs after expansion and dedup
    pub legs: usize,
    pub duplicates_removed: usize,
    /// Input/output items skipped for missing asset fields
    pub malformed_items: usize,
    /// Legs with at least one invalid per-row metric
    pub invalid_legs: usize,
    pub avg_implied_apy: Metric,
    pub total_weighted_points: Metric,
    pub curve_points: usize,
    /// Legs traded below the fair-value curve
    pub legs_below_fair: usize,
    /// Price rows with a close below fair value
    pub prices_below_fair: usize,
    /// Most recent price row with both a close and a fair value
    pub latest: Option<LatestQuote>,
}

/// Latest close against fair value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatestQuote {
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub fair_value: f64,
}

impl ValuationSummary {
    pub fn from_result(result: &ValuationResult) -> Self {
        let latest = result.prices.iter().rev().find_map(|p| {
            let close = p.point.price.as_ref()?.close;
            let fair_value = p.fair_value.value()?;
            Some(LatestQuote {
                timestamp: p.point.sample.timestamp,
                close,
                fair_value,
            })
        });

        Self {
            symbol: result.asset.symbol.clone(),
            maturity: result.asset.maturity,
            records: result.expansion.records,
            legs: result.legs.len(),
            duplicates_removed: result.expansion.duplicates_removed,
            malformed_items: result.expansion.malformed.len(),
            invalid_legs: result.invalid_legs(),
            avg_implied_apy: result.avg_implied_apy,
            total_weighted_points: result.total_weighted_points,
            curve_points: result.curve.len(),
            legs_below_fair: result
                .legs
                .iter()
                .filter(|l| l.below_fair() == Some(true))
                .count(),
            prices_below_fair: result
                .prices
                .iter()
                .filter(|p| p.below_fair() == Some(true))
                .count(),
            latest,
        }
    }

    /// Format as table for CLI output
    pub fn format_table(&self) -> String {
        let latest = match &self.latest {
            Some(q) => format!(
                "{} close {:.6} / fair {:.6} ({:+.2}%)",
                q.timestamp.format("%Y-%m-%d %H:%M"),
                q.close,
                q.fair_value,
                premium_pct(q.close, q.fair_value),
            ),
            None => "n/a".to_string(),
        };

        format!(
            r#"
══════════════════════════════════════════════════════
               YT FAIR VALUE
══════════════════════════════════════════════════════
Asset:            {}
Maturity:         {}

AGGREGATES
───────────────────────────────────────────────────────
Avg Implied APY:  {}
Weighted Points:  {}
Curve Points:     {}

TRANSACTIONS
───────────────────────────────────────────────────────
Records:          {}
Legs:             {}
Duplicates:       {}
Malformed Items:  {}
Invalid Legs:     {}
Below Fair:       {}

PRICES
───────────────────────────────────────────────────────
Below Fair:       {}
Latest:           {}
══════════════════════════════════════════════════════
"#,
            self.symbol,
            self.maturity.format("%Y-%m-%d %H:%M UTC"),
            format_metric(&self.avg_implied_apy, |v| format!("{:.4}%", v * 100.0)),
            format_metric(&self.total_weighted_points, |v| format!("{:.2}", v)),
            self.curve_points,
            self.records,
            self.legs,
            self.duplicates_removed,
            self.malformed_items,
            self.invalid_legs,
            self.legs_below_fair,
            self.prices_below_fair,
            latest,
        )
    }
}

fn format_metric(metric: &Metric, valid: impl Fn(f64) -> String) -> String {
    match metric {
        Metric::Valid(v) => valid(*v),
        Metric::Invalid(fault) => format!("n/a ({})", fault),
    }
}

fn premium_pct(close: f64, fair_value: f64) -> f64 {
    if fair_value == 0.0 {
        0.0
    } else {
        (close / fair_value - 1.0) * 100.0
    }
}
