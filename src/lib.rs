//! yt-fair-value: valuation of Pendle yield tokens
//!
//! This library provides the core components for:
//! - Flattening nested swap transactions into per-asset legs
//! - Backward as-of alignment of hourly APY, price and trade series
//! - Per-trade YT pricing, long-yield APY and points yield
//! - Volume-weighted implied APY and the hourly fair-value curve
//! - Pendle API and snapshot data sources
//! - Parquet export and summary reporting

pub mod cli;
pub mod config;
pub mod data;
pub mod series;
pub mod source;
pub mod telemetry;
pub mod transaction;
pub mod valuation;
