//! analyzer - Rate-driven simulator for size-adaptive circular buffers.

mod config;
mod controller;
mod output;
mod runner;

use std::path::PathBuf;

use anyhow::Result;
use blockring_buffer::PolicyKind;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{AnalyzerConfig, BufferEntry, DEFAULT_TICKS, Phase};
use output::{MetricPrinter, Output, OutputFormat};
use runner::Runner;

/// Drives buffers with scripted write and read rates and reports how their
/// allocation follows the load.
#[derive(Parser, Debug)]
#[command(name = "analyzer")]
#[command(about = "Rate-driven simulator for size-adaptive circular buffers")]
#[command(version)]
struct Args {
    /// Simulation config file (YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run a single phase of this many ticks instead of the configured phases
    #[arg(long)]
    ticks: Option<u64>,

    /// Write rate of the single phase, in units per second
    #[arg(long)]
    write_rate: Option<f64>,

    /// Read rate of the single phase, in units per second
    #[arg(long)]
    read_rate: Option<f64>,

    /// Buffer policy to simulate (repeatable: shift, no-shift, hold)
    #[arg(short, long)]
    policy: Vec<PolicyKind>,

    /// Block size in units
    #[arg(long)]
    block_size: Option<usize>,

    /// Maximum buffer size in units
    #[arg(long)]
    max: Option<usize>,

    /// Hold window in operations for hold buffers
    #[arg(long)]
    hold_window: Option<usize>,

    /// Refresh interval in seconds, in (0, 1]
    #[arg(long)]
    interval: Option<f64>,

    /// Sleep for the refresh interval between ticks
    #[arg(long)]
    realtime: bool,

    /// Print metric rows as JSON lines and the summary as JSON
    #[arg(long)]
    json: bool,

    /// Print every Nth tick
    #[arg(long, default_value_t = 1)]
    every: u64,

    /// Write the summary to a file instead of stdout
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries metrics.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&args)?;
    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Yaml
    };

    let runner = Runner::new(&config)?;
    info!(
        buffers = config.buffers.len(),
        ticks = config.total_ticks(),
        realtime = config.realtime,
        "simulation starting"
    );
    let (tx, mut rx) = mpsc::channel(1024);
    let every = args.every;
    let printer = tokio::spawn(async move {
        let mut printer = MetricPrinter::new(std::io::stdout(), format, every);
        while let Some(m) = rx.recv().await {
            printer.print(&m)?;
        }
        anyhow::Ok(())
    });

    let summary = runner.run(tx).await?;
    printer.await??;

    Output::new(format, args.output.clone()).write(&summary)?;
    if let Some(path) = &args.output {
        eprintln!("Summary saved to {}", path.display());
    }
    Ok(())
}

/// Loads the config file, if any, and applies command line overrides.
fn build_config(args: &Args) -> Result<AnalyzerConfig> {
    let mut config = match &args.config {
        Some(path) => AnalyzerConfig::load(path)?,
        None => AnalyzerConfig::default(),
    };

    if let Some(interval) = args.interval {
        config.refresh_interval = interval;
    }
    if let Some(block_size) = args.block_size {
        config.block_size = block_size;
    }
    if let Some(max) = args.max {
        config.maximum_buffer_size = max;
    }
    if args.hold_window.is_some() {
        config.hold_window = args.hold_window;
    }
    if args.realtime {
        config.realtime = true;
    }
    if !args.policy.is_empty() {
        config.buffers = args.policy.iter().copied().map(BufferEntry::new).collect();
    }

    let rates_given = args.ticks.is_some() || args.write_rate.is_some() || args.read_rate.is_some();
    if rates_given || config.phases.is_empty() {
        config.phases = vec![Phase::running(
            args.ticks.unwrap_or(DEFAULT_TICKS),
            args.write_rate.unwrap_or(0.0),
            args.read_rate.unwrap_or(0.0),
        )];
    }

    config.validate()?;
    Ok(config)
}
