//! Stop command

use anyhow::{Context, Result};
use colored::Colorize;
use optimizer_lib::{ActionConfig, ActionExecutor, ActionLogEntry, ActionOutcome, FleetSnapshot};
use std::path::Path;
use std::sync::Arc;

use crate::output::{color_log_line, print_error, OutputFormat};

/// Stop the given instances and return the action log
pub async fn stop_instances(
    fleet: Arc<FleetSnapshot>,
    region: &str,
    instance_ids: &[String],
    config: ActionConfig,
) -> Result<Vec<ActionLogEntry>> {
    let executor =
        ActionExecutor::new(fleet, region, config).context("Invalid stop configuration")?;
    Ok(executor.stop(instance_ids).await)
}

/// Stop instances by identifier and print the action log
pub async fn run(
    fleet: Arc<FleetSnapshot>,
    region: &str,
    instance_ids: &[String],
    config: ActionConfig,
    log_output: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let log = stop_instances(fleet, region, instance_ids, config).await?;
    if let Some(path) = log_output {
        save_action_log(&log, path)?;
    }
    print_action_log(&log, format)?;
    Ok(())
}

/// Write the action log as plain text, one line per entry
pub fn save_action_log(log: &[ActionLogEntry], path: &Path) -> Result<()> {
    let text: String = log.iter().map(|entry| format!("{}\n", entry)).collect();
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write action log to {}", path.display()))
}

/// Print the action log, one line per entry
pub fn print_action_log(log: &[ActionLogEntry], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(log)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            println!("{}", "Action Log".bold());
            println!("{}", "-".repeat(50));
            for entry in log {
                println!("{}", color_log_line(entry));
            }

            let failed = log
                .iter()
                .filter(|entry| entry.outcome == ActionOutcome::Failed)
                .count();
            if failed > 0 {
                print_error(&format!("{} instance(s) could not be stopped", failed));
            }
        }
    }
    Ok(())
}
