//! Cloud Resource Optimizer CLI
//!
//! A command-line tool for finding idle compute instances by CPU history
//! and stopping them.

mod commands;
mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use optimizer_lib::{FleetSnapshot, OptimizerMetrics};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Cloud Resource Optimizer CLI
#[derive(Parser)]
#[command(name = "cro")]
#[command(author, version, about = "CLI for Cloud Resource Optimizer", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ~/.config/cro/config.toml)
    #[arg(long, env = "CRO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Fleet snapshot JSON file used as the instance provider
    #[arg(long, env = "CRO_FLEET_FILE")]
    pub fleet_file: Option<PathBuf>,

    /// Region to scan
    #[arg(long, short)]
    pub region: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Write Prometheus metrics to this file when done
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan running instances and report which are idle
    Scan {
        #[command(flatten)]
        scan: ScanArgs,

        /// Save the JSON report to a file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Stop instances by identifier
    Stop {
        /// Instance identifiers to stop
        #[arg(required = true)]
        instance_ids: Vec<String>,

        #[command(flatten)]
        action: ActionArgs,

        /// Save the action log to a text file
        #[arg(long)]
        log_output: Option<PathBuf>,
    },

    /// Scan, then stop every instance found idle
    Optimize {
        #[command(flatten)]
        scan: ScanArgs,

        #[command(flatten)]
        action: ActionArgs,

        /// Save the JSON report to a file
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Save the action log to a text file
        #[arg(long)]
        log_output: Option<PathBuf>,
    },
}

/// Idle rule and scan tuning flags
#[derive(Args, Debug, Default)]
pub struct ScanArgs {
    /// CPU idle threshold in percent
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Minimum low-usage periods to mark an instance idle
    #[arg(long)]
    pub min_idle_periods: Option<u32>,

    /// Lookback window in days
    #[arg(long)]
    pub lookback_days: Option<u64>,

    /// Sampling period in hours
    #[arg(long)]
    pub period_hours: Option<u64>,

    /// Metrics fetches to run in parallel
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Give up on the scan after this many seconds and report what finished
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

/// Stop tuning flags
#[derive(Args, Debug, Default)]
pub struct ActionArgs {
    /// Show what would be stopped without stopping anything
    #[arg(long)]
    pub dry_run: bool,

    /// Instances per stop request
    #[arg(long)]
    pub batch_size: Option<usize>,
}

impl ScanArgs {
    fn apply(&self, settings: &mut config::Settings) {
        if let Some(threshold) = self.threshold {
            settings.threshold_percent = threshold;
        }
        if let Some(periods) = self.min_idle_periods {
            settings.min_idle_periods = periods;
        }
        if let Some(days) = self.lookback_days {
            settings.lookback_days = days;
        }
        if let Some(hours) = self.period_hours {
            settings.period_hours = hours;
        }
        if let Some(concurrency) = self.concurrency {
            settings.max_concurrent_fetches = concurrency;
        }
        if let Some(timeout) = self.timeout_secs {
            settings.scan_timeout_secs = Some(timeout);
        }
    }
}

impl ActionArgs {
    fn apply(&self, settings: &mut config::Settings) {
        if let Some(size) = self.batch_size {
            settings.batch_size = size;
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Broadcast a shutdown when Ctrl-C is pressed so a running scan stops early
fn shutdown_on_ctrl_c() -> broadcast::Receiver<()> {
    let (tx, rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping scan");
            let _ = tx.send(());
        }
    });
    rx
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let mut settings = config::Settings::load(cli.config.as_deref())?;
    if let Some(region) = &cli.region {
        settings.region = region.clone();
    }
    if let Some(path) = &cli.fleet_file {
        settings.fleet_file = path.clone();
    }
    match &cli.command {
        Commands::Scan { scan, .. } => scan.apply(&mut settings),
        Commands::Stop { action, .. } => action.apply(&mut settings),
        Commands::Optimize { scan, action, .. } => {
            scan.apply(&mut settings);
            action.apply(&mut settings);
        }
    }
    info!(region = %settings.region, fleet_file = %settings.fleet_file.display(), "CLI configured");

    // One provider client for the whole run
    let fleet = Arc::new(FleetSnapshot::load(&settings.fleet_file).await?);

    match &cli.command {
        Commands::Scan { output, .. } => {
            commands::scan::run(
                fleet,
                &settings.scan_config()?,
                output.as_deref(),
                shutdown_on_ctrl_c(),
                cli.format,
            )
            .await?;
        }
        Commands::Stop {
            instance_ids,
            action,
            log_output,
        } => {
            commands::stop::run(
                fleet,
                &settings.region,
                instance_ids,
                settings.action_config(action.dry_run),
                log_output.as_deref(),
                cli.format,
            )
            .await?;
        }
        Commands::Optimize {
            action,
            output,
            log_output,
            ..
        } => {
            commands::optimize::run(
                fleet,
                &settings.scan_config()?,
                settings.action_config(action.dry_run),
                output.as_deref(),
                log_output.as_deref(),
                shutdown_on_ctrl_c(),
                cli.format,
            )
            .await?;
        }
    }

    if let Some(path) = &cli.metrics_file {
        let text = OptimizerMetrics::new().render()?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }

    Ok(())
}
