//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use optimizer_lib::{ActionLogEntry, ActionOutcome, ReportRow, RowOutcome};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a percentage threshold
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Idle column for a report row
pub fn idle_label(row: &ReportRow) -> String {
    match &row.outcome {
        RowOutcome::Classified(verdict) if verdict.idle => "Yes".yellow().bold().to_string(),
        RowOutcome::Classified(_) => "No".green().to_string(),
        RowOutcome::MetricsUnavailable { .. } => "?".red().to_string(),
    }
}

/// Low-usage column for a report row
pub fn low_usage_label(row: &ReportRow) -> String {
    match &row.outcome {
        RowOutcome::Classified(verdict) => verdict.low_usage_periods.to_string(),
        RowOutcome::MetricsUnavailable { .. } => "-".to_string(),
    }
}

/// Color an action log line by outcome
pub fn color_log_line(entry: &ActionLogEntry) -> String {
    let line = entry.to_string();
    match (entry.instance_id.is_some(), entry.outcome) {
        (false, _) => line.blue().to_string(),
        (true, ActionOutcome::Stopped) => line.green().to_string(),
        (true, ActionOutcome::Skipped) => line.yellow().to_string(),
        (true, ActionOutcome::Failed) => line.red().to_string(),
    }
}

/// Shorten long provider error messages for table cells
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let kept: String = text.chars().take(max_chars).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(5.0), "5.0%");
        assert_eq!(format_percent(12.345), "12.3%");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer message", 6), "a much...");
    }
}
