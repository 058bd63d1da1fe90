//! Data export module
//!
//! Writes the enriched series to Parquet for offline analysis

mod parquet;

pub use parquet::{curve_schema, legs_schema, prices_schema, ExportedFiles, ParquetWriter};
