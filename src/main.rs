//! cct - Collect daily cloud costs and store them in InfluxDB

use cct::{
    cli::Cli,
    output::JsonLinesSink,
    pipeline::{run_range, target_days},
};
use cct_core::{DayAllocator, Result, source::CostSink};
use cct_influx::InfluxSink;
use clap::Parser;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging. The --quiet flag should override RUST_LOG.
    // Logs go to stderr so dry-run output on stdout stays parseable.
    let filter = if cli.quiet {
        tracing_subscriber::EnvFilter::new("warn")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cct=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let tz_config = cli.timezone_config()?;
    info!("Using timezone: {}", tz_config.display_name());

    let (since, until) = cli.date_range(tz_config.today())?;
    let source = cli.source()?;
    let allocator = DayAllocator::new(source.cloud()).with_filter(cli.record_filter());

    let sink: Box<dyn CostSink> = if cli.dry_run {
        Box::new(JsonLinesSink::stdout())
    } else {
        let sink = InfluxSink::new(cli.db.clone().into())?;
        if let Err(e) = sink.ping().await {
            warn!("Database at {} did not answer: {}", cli.db.db_address, e);
        }
        Box::new(sink)
    };

    let days = target_days(since, until, &tz_config);
    let outcome = run_range(source.as_ref(), &allocator, sink.as_ref(), &days).await;

    let written: usize = outcome.completed.iter().map(|s| s.written).sum();
    info!(
        "Done: {} of {} days collected, {} records written",
        outcome.completed.len(),
        days.len(),
        written
    );

    if outcome.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
