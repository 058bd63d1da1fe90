//! Run command implementation

use super::{emit, OutputArgs};
use crate::config::Config;
use crate::source::{gather, PendleClient};
use crate::telemetry::{record_latency, StageMetric};
use crate::valuation;
use chrono::{DateTime, Utc};
use clap::Args;
use std::time::Instant;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Start of the history window (RFC 3339), overrides the config
    #[arg(long)]
    pub start: Option<DateTime<Utc>>,

    /// End of the history window (RFC 3339), defaults to now
    #[arg(long)]
    pub end: Option<DateTime<Utc>>,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let start = self.start.unwrap_or(config.market.start);
        let end = self.end.or(config.market.end).unwrap_or_else(Utc::now);
        if end <= start {
            anyhow::bail!("end {} is not after start {}", end, start);
        }

        let client = PendleClient::with_config(config.pendle_config())?;
        tracing::info!(
            network = %config.market.network,
            market = %config.market.market,
            %start,
            %end,
            "Fetching market data"
        );

        let started = Instant::now();
        let inputs = gather(
            &client,
            &config.market.yt,
            start,
            end,
            &config.transaction_filter(),
        )
        .await?;
        record_latency(StageMetric::Fetch, started.elapsed());

        let result = valuation::run(inputs, &config.valuation_params()?)?;
        emit(&result, &self.output.resolve(&config.output))
    }
}
