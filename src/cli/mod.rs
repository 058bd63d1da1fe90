//! CLI interface for yt-fair-value
//!
//! Provides subcommands for:
//! - `run`: Fetch a market from the Pendle API and value it
//! - `analyze`: Value a market snapshot file
//! - `config`: Show the effective configuration

mod analyze;
mod run;

pub use analyze::AnalyzeArgs;
pub use run::RunArgs;

use crate::config::{OutputConfig, OutputFormat};
use crate::data::ParquetWriter;
use crate::telemetry::{record_latency, StageMetric};
use crate::valuation::ValuationResult;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "yt-fair-value")]
#[command(about = "Fair-value and points valuation for Pendle yield tokens")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch market data from the Pendle API and value it
    Run(RunArgs),
    /// Value a snapshot file
    Analyze(AnalyzeArgs),
    /// Show configuration
    Config,
}

/// Output overrides shared by the valuation commands
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output directory for Parquet files
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Summary format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Skip the Parquet export
    #[arg(long)]
    pub no_parquet: bool,
}

impl OutputArgs {
    /// Apply overrides on top of the configured output
    pub fn resolve(&self, config: &OutputConfig) -> OutputConfig {
        OutputConfig {
            dir: self.output.clone().unwrap_or_else(|| config.dir.clone()),
            parquet: config.parquet && !self.no_parquet,
            format: self.format.unwrap_or(config.format),
        }
    }
}

/// Print the summary and export the result
pub fn emit(result: &ValuationResult, output: &OutputConfig) -> anyhow::Result<()> {
    let summary = result.summary();
    match output.format {
        OutputFormat::Table => println!("{}", summary.format_table()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }

    if output.parquet {
        let started = Instant::now();
        let files = ParquetWriter::new(output.dir.clone()).export(result)?;
        record_latency(StageMetric::Export, started.elapsed());

        for path in [files.legs, files.prices, files.curve].into_iter().flatten() {
            tracing::info!(path = %path.display(), "Exported");
        }
    }

    Ok(())
}
