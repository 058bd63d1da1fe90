//! Backward as-of join
//!
//! Each left row is matched with the most recent right row whose timestamp is
//! not later than its own. Inputs must be ascending; the join never sorts.

use super::Timestamped;
use chrono::Duration;
use std::fmt;
use thiserror::Error;

/// Which input of a join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesSide {
    Left,
    Right,
}

impl fmt::Display for SeriesSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesSide::Left => write!(f, "left"),
            SeriesSide::Right => write!(f, "right"),
        }
    }
}

/// Alignment errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    /// Input series is not timestamp-ascending
    #[error("{side} series is not ascending at row {index}")]
    Unsorted { side: SeriesSide, index: usize },
}

fn check_ascending<T: Timestamped>(series: &[T], side: SeriesSide) -> Result<(), AlignError> {
    match series
        .windows(2)
        .position(|pair| pair[1].timestamp() < pair[0].timestamp())
    {
        Some(i) => Err(AlignError::Unsorted { side, index: i + 1 }),
        None => Ok(()),
    }
}

/// Backward as-of join of `left` against `right`
///
/// `attach` receives every left row in order together with its match, or
/// `None` when no right row precedes it.
pub fn align_backward<L, R, T, F>(left: &[L], right: &[R], attach: F) -> Result<Vec<T>, AlignError>
where
    L: Timestamped,
    R: Timestamped,
    F: FnMut(&L, Option<&R>) -> T,
{
    join(left, right, None, attach)
}

/// Backward as-of join that only matches right rows within `tolerance`
pub fn align_backward_within<L, R, T, F>(
    left: &[L],
    right: &[R],
    tolerance: Duration,
    attach: F,
) -> Result<Vec<T>, AlignError>
where
    L: Timestamped,
    R: Timestamped,
    F: FnMut(&L, Option<&R>) -> T,
{
    join(left, right, Some(tolerance), attach)
}

/// Backward as-of join that consumes `left`
///
/// Same matching as [`align_backward`], but each left row is moved into
/// `attach` instead of borrowed.
pub fn align_backward_owned<L, R, T, F>(left: Vec<L>, right: &[R], attach: F) -> Result<Vec<T>, AlignError>
where
    L: Timestamped,
    R: Timestamped,
    F: FnMut(L, Option<&R>) -> T,
{
    check_ascending(&left, SeriesSide::Left)?;
    check_ascending(right, SeriesSide::Right)?;
    Ok(scan(left, right, None, attach))
}

fn join<L, R, T, F>(
    left: &[L],
    right: &[R],
    tolerance: Option<Duration>,
    attach: F,
) -> Result<Vec<T>, AlignError>
where
    L: Timestamped,
    R: Timestamped,
    F: FnMut(&L, Option<&R>) -> T,
{
    check_ascending(left, SeriesSide::Left)?;
    check_ascending(right, SeriesSide::Right)?;
    Ok(scan(left, right, tolerance, attach))
}

fn scan<I, R, T, F>(left: I, right: &[R], tolerance: Option<Duration>, mut attach: F) -> Vec<T>
where
    I: IntoIterator,
    I::Item: Timestamped,
    R: Timestamped,
    F: FnMut(I::Item, Option<&R>) -> T,
{
    let left = left.into_iter();

    // Both sides ascending: a single forward cursor over `right` suffices
    let mut cursor = 0usize;
    let mut out = Vec::with_capacity(left.size_hint().0);

    for row in left {
        let t = row.timestamp();
        while cursor < right.len() && right[cursor].timestamp() <= t {
            cursor += 1;
        }

        let matched = cursor
            .checked_sub(1)
            .map(|i| &right[i])
            .filter(|r| match tolerance {
                Some(tol) => t - r.timestamp() <= tol,
                None => true,
            });

        out.push(attach(row, matched));
    }

    out
}
