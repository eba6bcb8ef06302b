//! Scan-then-stop command

use anyhow::Result;
use optimizer_lib::{ActionConfig, ActionLogEntry, FleetSnapshot, ScanConfig, ScanReport};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::commands::scan::{print_report, save_report, scan_fleet};
use crate::commands::stop::{print_action_log, save_action_log, stop_instances};
use crate::output::{print_warning, OutputFormat};

/// Combined JSON output of an optimization run
#[derive(Serialize)]
struct OptimizeOutput<'a> {
    report: &'a ScanReport,
    actions: &'a [ActionLogEntry],
}

/// Scan the fleet, then stop whatever the scan found idle
pub async fn run(
    fleet: Arc<FleetSnapshot>,
    scan_config: &ScanConfig,
    action_config: ActionConfig,
    output: Option<&Path>,
    log_output: Option<&Path>,
    shutdown: broadcast::Receiver<()>,
    format: OutputFormat,
) -> Result<()> {
    let report = scan_fleet(fleet.clone(), scan_config, shutdown).await?;
    if let Some(path) = output {
        save_report(&report, path)?;
    }

    if matches!(format, OutputFormat::Table) {
        print_report(&report);
        println!();
        if !report.complete {
            print_warning("Acting only on instances evaluated before cancellation");
        }
        if action_config.dry_run {
            print_warning("Dry-run mode - no instances will be stopped");
        }
    }

    let idle = report.idle_instance_ids();
    let log = stop_instances(fleet, &scan_config.region, &idle, action_config).await?;
    if let Some(path) = log_output {
        save_action_log(&log, path)?;
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&OptimizeOutput {
                report: &report,
                actions: &log,
            })?;
            println!("{}", json);
        }
        OutputFormat::Table => print_action_log(&log, format)?,
    }

    Ok(())
}
