//! Analyze command implementation

use super::{emit, OutputArgs};
use crate::config::Config;
use crate::source::{gather, SnapshotSource, TransactionFilter};
use crate::valuation;
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Snapshot file (JSON)
    pub snapshot: PathBuf,

    /// Start of the history window, defaults to the first sample
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,

    /// End of the history window, defaults to the last sample
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,

    /// Value every transaction in the snapshot, ignoring the configured filter
    #[arg(long)]
    pub all_transactions: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl AnalyzeArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let source = SnapshotSource::load(&self.snapshot)?;
        let asset = source.snapshot().asset.address.clone();

        let (first, last) = source
            .history_range()
            .ok_or_else(|| anyhow::anyhow!("snapshot {} has no history", self.snapshot.display()))?;
        let start = self.start.unwrap_or(first);
        let end = self.end.unwrap_or(last);

        let filter = if self.all_transactions {
            TransactionFilter {
                actions: Vec::new(),
                origins: Vec::new(),
                min_value: 0.0,
            }
        } else {
            config.transaction_filter()
        };

        tracing::info!(snapshot = %self.snapshot.display(), %start, %end, "Analyzing snapshot");

        let inputs = gather(&source, &asset, start, end, &filter).await?;
        let result = valuation::run(inputs, &config.valuation_params()?)?;
        emit(&result, &self.output.resolve(&config.output))
    }
}
