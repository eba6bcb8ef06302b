//! Core data models for the optimizer

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a compute instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Running,
    Stopped,
    /// Any other provider state (pending, stopping, terminated, ...)
    Other(String),
}

impl InstanceState {
    /// Parse a provider state name, case-insensitively
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "running" => InstanceState::Running,
            "stopped" => InstanceState::Stopped,
            other => InstanceState::Other(other.to_string()),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, InstanceState::Running)
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceState::Running => f.write_str("running"),
            InstanceState::Stopped => f.write_str("stopped"),
            InstanceState::Other(name) => f.write_str(name),
        }
    }
}

/// Snapshot of a compute instance taken at scan time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    pub instance_type: String,
    pub state: InstanceState,
}

impl Instance {
    pub fn new(
        instance_id: impl Into<String>,
        instance_type: impl Into<String>,
        state: InstanceState,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            instance_type: instance_type.into(),
            state,
        }
    }
}

/// One per-period average CPU utilization value (percent, 0-100)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilizationSample {
    pub timestamp: DateTime<Utc>,
    pub average: f64,
}

impl UtilizationSample {
    pub fn new(timestamp: DateTime<Utc>, average: f64) -> Self {
        Self { timestamp, average }
    }
}

/// Half-open time window `[start, end)` a scan looks back over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookbackWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl LookbackWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window of the given length ending at `end`
    ///
    /// Returns `None` when the start would fall outside the representable
    /// date range.
    pub fn ending_at(end: DateTime<Utc>, length: Duration) -> Option<Self> {
        let start = end.checked_sub_signed(length)?;
        Some(Self { start, end })
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

/// Idle/active decision for one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub instance_id: String,
    /// Number of sampling periods whose average fell below the threshold
    pub low_usage_periods: usize,
    pub idle: bool,
}

/// Outcome of evaluating a single instance during a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    Classified(Verdict),
    MetricsUnavailable { detail: String },
}

/// One report line: the instance and what the scan concluded about it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub instance: Instance,
    pub outcome: RowOutcome,
}

impl ReportRow {
    pub fn verdict(&self) -> Option<&Verdict> {
        match &self.outcome {
            RowOutcome::Classified(verdict) => Some(verdict),
            RowOutcome::MetricsUnavailable { .. } => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.verdict().map(|v| v.idle).unwrap_or(false)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, RowOutcome::MetricsUnavailable { .. })
    }
}

/// Result of one fleet scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub region: String,
    pub threshold_percent: f64,
    pub min_idle_periods: u32,
    pub window: LookbackWindow,
    /// Rows ordered by instance identifier ascending
    pub rows: Vec<ReportRow>,
    /// False when the scan was cancelled before every instance was evaluated
    pub complete: bool,
    /// Instances the scan never got to (only non-empty when incomplete)
    pub unevaluated: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl ScanReport {
    /// Identifiers of idle instances, ready for handoff to the action executor
    pub fn idle_instance_ids(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|row| row.is_idle())
            .map(|row| row.instance.instance_id.clone())
            .collect()
    }

    pub fn idle_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_idle()).count()
    }

    pub fn active_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.verdict().map(|v| !v.idle).unwrap_or(false))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_failed()).count()
    }
}

/// What happened to one instance submitted for stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOutcome {
    Stopped,
    Skipped,
    Failed,
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Stopped => f.write_str("stopped"),
            ActionOutcome::Skipped => f.write_str("skipped"),
            ActionOutcome::Failed => f.write_str("failed"),
        }
    }
}

/// Action log line for a stop attempt
///
/// `instance_id` is only absent for the informational entry produced when
/// there was nothing to stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    pub outcome: ActionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ActionLogEntry {
    pub fn stopped(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: Some(instance_id.into()),
            outcome: ActionOutcome::Stopped,
            detail: None,
        }
    }

    pub fn skipped(instance_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            instance_id: Some(instance_id.into()),
            outcome: ActionOutcome::Skipped,
            detail: Some(reason.into()),
        }
    }

    pub fn failed(instance_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            instance_id: Some(instance_id.into()),
            outcome: ActionOutcome::Failed,
            detail: Some(detail.into()),
        }
    }

    /// Entry recorded when the executor was handed an empty list
    pub fn nothing_to_do() -> Self {
        Self {
            instance_id: None,
            outcome: ActionOutcome::Skipped,
            detail: Some("No idle instances to stop.".to_string()),
        }
    }
}

impl fmt::Display for ActionLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let detail = self.detail.as_deref().unwrap_or_default();
        match (&self.instance_id, self.outcome) {
            (None, _) => write!(f, "[INFO] {}", detail),
            (Some(id), ActionOutcome::Stopped) => write!(f, "[ACTION] Stopped instance: {}", id),
            (Some(id), ActionOutcome::Skipped) => {
                write!(f, "[INFO] Skipped instance {}: {}", id, detail)
            }
            (Some(id), ActionOutcome::Failed) => {
                write!(f, "[ERROR] Failed to stop instance {}: {}", id, detail)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, outcome: RowOutcome) -> ReportRow {
        ReportRow {
            instance: Instance::new(id, "t3.micro", InstanceState::Running),
            outcome,
        }
    }

    #[test]
    fn test_instance_state_parse() {
        assert_eq!(InstanceState::parse("running"), InstanceState::Running);
        assert_eq!(InstanceState::parse("RUNNING"), InstanceState::Running);
        assert_eq!(InstanceState::parse(" stopped "), InstanceState::Stopped);
        assert_eq!(
            InstanceState::parse("terminated"),
            InstanceState::Other("terminated".to_string())
        );
        assert_eq!(InstanceState::parse("pending").to_string(), "pending");
    }

    #[test]
    fn test_window_contains_is_half_open() {
        let end = Utc::now();
        let window = LookbackWindow::ending_at(end, Duration::days(7)).unwrap();

        assert!(window.contains(window.start));
        assert!(window.contains(end - Duration::seconds(1)));
        assert!(!window.contains(end));
        assert!(!window.contains(window.start - Duration::seconds(1)));
    }

    #[test]
    fn test_window_out_of_date_range() {
        assert!(LookbackWindow::ending_at(Utc::now(), Duration::days(100_000_000)).is_none());
    }

    #[test]
    fn test_report_counts_and_idle_ids() {
        let report = ScanReport {
            region: "us-east-1".to_string(),
            threshold_percent: 5.0,
            min_idle_periods: 3,
            window: LookbackWindow::ending_at(Utc::now(), Duration::days(7)).unwrap(),
            rows: vec![
                row(
                    "i-a",
                    RowOutcome::Classified(Verdict {
                        instance_id: "i-a".to_string(),
                        low_usage_periods: 5,
                        idle: true,
                    }),
                ),
                row(
                    "i-b",
                    RowOutcome::Classified(Verdict {
                        instance_id: "i-b".to_string(),
                        low_usage_periods: 0,
                        idle: false,
                    }),
                ),
                row(
                    "i-c",
                    RowOutcome::MetricsUnavailable {
                        detail: "throttled".to_string(),
                    },
                ),
            ],
            complete: true,
            unevaluated: vec![],
            generated_at: Utc::now(),
        };

        assert_eq!(report.idle_instance_ids(), vec!["i-a".to_string()]);
        assert_eq!(report.idle_count(), 1);
        assert_eq!(report.active_count(), 1);
        assert_eq!(report.failed_count(), 1);
    }

    #[test]
    fn test_action_log_entry_display() {
        assert_eq!(
            ActionLogEntry::stopped("i-1").to_string(),
            "[ACTION] Stopped instance: i-1"
        );
        assert_eq!(
            ActionLogEntry::failed("i-2", "UnauthorizedOperation").to_string(),
            "[ERROR] Failed to stop instance i-2: UnauthorizedOperation"
        );
        assert_eq!(
            ActionLogEntry::nothing_to_do().to_string(),
            "[INFO] No idle instances to stop."
        );
    }

    #[test]
    fn test_row_outcome_serializes_with_status_tag() {
        let outcome = RowOutcome::MetricsUnavailable {
            detail: "timeout".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "metrics_unavailable");
        assert_eq!(json["detail"], "timeout");
    }
}
