use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;

use cm_data::{MarketDataProvider, SnapshotFileProvider, YahooProvider};
use cm_engine::{logging, Collector, MonitorConfig, RunOutcome, CONFIG_ENV};

/// Collect end-of-day quotes and greeks for the monitored option positions.
#[derive(Parser, Debug)]
#[command(name = "callmon", version, about)]
struct Cli {
    /// JSON config file
    #[arg(short, long, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// History CSV to merge into (overrides the config)
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Publication copy of the history CSV (overrides the config)
    #[arg(long)]
    mirror: Option<PathBuf>,

    /// Read market data from a recorded snapshot instead of Yahoo Finance
    #[arg(long)]
    snapshots: Option<PathBuf>,

    /// Collect even if the calendar says the market is closed
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    let mut config = MonitorConfig::load(cli.config.as_deref()).context("loading config")?;
    if let Some(path) = cli.data_file {
        config.data_file = path;
    }
    if let Some(path) = cli.mirror {
        config.mirror_file = Some(path);
    }
    let timezone = config.tz()?;

    let provider: Box<dyn MarketDataProvider> = match &cli.snapshots {
        Some(path) => Box::new(SnapshotFileProvider::from_path(path)?),
        None => Box::new(YahooProvider::new(timezone)),
    };
    let calendar = Box::new(config.calendar());

    tracing::info!(
        "=== {} Call Monitor: {} contracts via {} ===",
        config.underlying,
        config.contracts.len(),
        provider.name()
    );

    let mut collector = Collector::new(config, provider, calendar)?.ignore_calendar(cli.force);
    let today = Utc::now().with_timezone(&timezone).date_naive();

    match collector.run(today).await.context("collection run failed")? {
        RunOutcome::MarketClosed { .. } => {}
        RunOutcome::NoData { skipped } => {
            tracing::warn!("No option data collected ({} contracts failed)", skipped.len());
        }
        RunOutcome::Collected(summary) => {
            tracing::info!(
                "=== Complete: {} records, {} rows in {} ===",
                summary.records.len(),
                summary.report.total,
                collector.store().path.display()
            );
        }
    }

    Ok(())
}
