//! Fleet scan command

use anyhow::{Context, Result};
use colored::Colorize;
use optimizer_lib::{FleetScanner, FleetSnapshot, RowOutcome, ScanConfig, ScanReport};
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;
use tokio::sync::broadcast;

use crate::output::{
    format_percent, idle_label, low_usage_label, print_info, print_success, print_warning,
    truncate, OutputFormat,
};

/// Row for the idle report table
#[derive(Tabled)]
struct ReportTableRow {
    #[tabled(rename = "Instance ID")]
    instance_id: String,
    #[tabled(rename = "Type")]
    instance_type: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Low Usage Periods")]
    low_usage: String,
    #[tabled(rename = "Idle?")]
    idle: String,
    #[tabled(rename = "Note")]
    note: String,
}

/// Scan the fleet and return the report
pub async fn scan_fleet(
    fleet: Arc<FleetSnapshot>,
    config: &ScanConfig,
    shutdown: broadcast::Receiver<()>,
) -> Result<ScanReport> {
    let scanner = FleetScanner::new(fleet.clone(), fleet);
    let report = scanner
        .scan_with_shutdown(config, shutdown)
        .await
        .context("Fleet scan failed")?;
    Ok(report)
}

/// Run a scan, print the report and optionally save it as JSON
pub async fn run(
    fleet: Arc<FleetSnapshot>,
    config: &ScanConfig,
    output: Option<&Path>,
    shutdown: broadcast::Receiver<()>,
    format: OutputFormat,
) -> Result<()> {
    let report = scan_fleet(fleet, config, shutdown).await?;

    if let Some(path) = output {
        save_report(&report, path)?;
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)?;
            println!("{}", json);
        }
        OutputFormat::Table => {
            print_report(&report);
            if let Some(path) = output {
                print_success(&format!("Report saved to {}", path.display()));
            }
        }
    }

    Ok(())
}

/// Write the report as pretty JSON
pub fn save_report(report: &ScanReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

/// Print the report as a table with a summary
pub fn print_report(report: &ScanReport) {
    println!("{}", "Idle Instance Report".bold());
    println!("{}", "=".repeat(50));
    println!("Region:                 {}", report.region.cyan());
    println!(
        "Window:                 {} → {}",
        report.window.start.format("%Y-%m-%d %H:%M"),
        report.window.end.format("%Y-%m-%d %H:%M")
    );
    println!(
        "Rule:                   < {} for at least {} period(s)",
        format_percent(report.threshold_percent),
        report.min_idle_periods
    );
    println!();

    if report.rows.is_empty() {
        print_warning("No running instances found");
    } else {
        let rows: Vec<ReportTableRow> = report
            .rows
            .iter()
            .map(|row| ReportTableRow {
                instance_id: row.instance.instance_id.clone(),
                instance_type: row.instance.instance_type.clone(),
                state: row.instance.state.to_string(),
                low_usage: low_usage_label(row),
                idle: idle_label(row),
                note: match &row.outcome {
                    RowOutcome::MetricsUnavailable { detail } => truncate(detail, 48),
                    RowOutcome::Classified(_) => String::new(),
                },
            })
            .collect();

        let table = tabled::Table::new(rows)
            .with(tabled::settings::Style::rounded())
            .to_string();
        println!("{}", table);
    }

    println!();
    println!(
        "Total: {} evaluated, {} idle, {} active, {} without metrics",
        report.rows.len(),
        report.idle_count().to_string().yellow().bold(),
        report.active_count(),
        report.failed_count()
    );

    if !report.complete {
        print_warning(&format!(
            "Scan was cancelled; {} instance(s) were not evaluated",
            report.unevaluated.len()
        ));
    } else if report.idle_count() == 0 && !report.rows.is_empty() {
        print_info("No idle instances found");
    }
}
