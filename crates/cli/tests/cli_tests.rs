//! CLI integration tests

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output};

const FLEET: &str = r#"[
    {"InstanceId": "i-web", "InstanceType": "m5.large", "State": "running",
     "CPUHistory": [35.0, 41.2, 38.9, 44.0, 39.5, 42.1, 40.0]},
    {"InstanceId": "i-batch", "InstanceType": "c5.xlarge", "State": "running",
     "CPUHistory": [1.0, 2.0, 3.0, 9.0, 0.5, 1.0, 2.0]},
    {"InstanceId": "i-old", "InstanceType": "t2.micro", "State": "stopped",
     "CPUHistory": [0.0, 0.0, 0.0]}
]"#;

fn fleet_file(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("instances.json");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(FLEET.as_bytes()).unwrap();
    path
}

/// Run the binary with HOME pointed at `home` so no user config is picked up
fn cro(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cro"))
        .env("HOME", home)
        .env_remove("CRO_CONFIG")
        .env_remove("CRO_FLEET_FILE")
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let home = tempfile::tempdir().unwrap();
    let output = cro(home.path(), &["--help"]);

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Cloud Resource Optimizer"),
        "Should show app name"
    );
    assert!(stdout.contains("scan"), "Should show scan command");
    assert!(stdout.contains("stop"), "Should show stop command");
    assert!(stdout.contains("optimize"), "Should show optimize command");
    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("CRO_FLEET_FILE"), "Should show env var");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let home = tempfile::tempdir().unwrap();
    let output = cro(home.path(), &["--version"]);

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("cro"), "Should show binary name");
}

/// Test scan subcommand help
#[test]
fn test_scan_help() {
    let home = tempfile::tempdir().unwrap();
    let output = cro(home.path(), &["scan", "--help"]);

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Scan help should succeed");
    assert!(stdout.contains("--threshold"), "Should show threshold option");
    assert!(
        stdout.contains("--min-idle-periods"),
        "Should show min idle periods option"
    );
    assert!(
        stdout.contains("--timeout-secs"),
        "Should show timeout option"
    );
}

/// Test stop without identifiers is rejected
#[test]
fn test_stop_requires_ids() {
    let home = tempfile::tempdir().unwrap();
    let output = cro(home.path(), &["stop"]);

    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}

/// Test JSON scan output lists running instances in order
#[test]
fn test_scan_json_report() {
    let home = tempfile::tempdir().unwrap();
    let fleet = fleet_file(home.path());
    let output = cro(
        home.path(),
        &["--fleet-file", fleet.to_str().unwrap(), "--format", "json", "scan"],
    );

    assert!(output.status.success(), "Scan should succeed");

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let rows = report["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["instance"]["instance_id"], "i-batch");
    assert_eq!(rows[0]["outcome"]["status"], "classified");
    assert_eq!(rows[0]["outcome"]["idle"], true);
    assert_eq!(rows[0]["outcome"]["low_usage_periods"], 6);
    assert_eq!(rows[1]["instance"]["instance_id"], "i-web");
    assert_eq!(rows[1]["outcome"]["idle"], false);
    assert_eq!(report["complete"], true);
}

/// Test the report can be saved to a file
#[test]
fn test_scan_writes_output_file() {
    let home = tempfile::tempdir().unwrap();
    let fleet = fleet_file(home.path());
    let report_path = home.path().join("report.json");

    let output = cro(
        home.path(),
        &[
            "--fleet-file",
            fleet.to_str().unwrap(),
            "scan",
            "--output",
            report_path.to_str().unwrap(),
        ],
    );

    assert!(output.status.success(), "Scan should succeed");
    let saved: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(saved["threshold_percent"], 5.0);
}

/// Test optimize in dry-run mode skips the idle instance
#[test]
fn test_optimize_dry_run() {
    let home = tempfile::tempdir().unwrap();
    let fleet = fleet_file(home.path());
    let output = cro(
        home.path(),
        &[
            "--fleet-file",
            fleet.to_str().unwrap(),
            "--format",
            "json",
            "optimize",
            "--dry-run",
        ],
    );

    assert!(output.status.success(), "Optimize should succeed");

    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let actions = result["actions"].as_array().unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0]["instance_id"], "i-batch");
    assert_eq!(actions[0]["outcome"], "skipped");
}

/// Test stopping an unknown instance is logged as failed, not a crash
#[test]
fn test_stop_unknown_instance_logged_as_failed() {
    let home = tempfile::tempdir().unwrap();
    let fleet = fleet_file(home.path());
    let output = cro(
        home.path(),
        &[
            "--fleet-file",
            fleet.to_str().unwrap(),
            "--format",
            "json",
            "stop",
            "i-web",
            "i-ghost",
        ],
    );

    assert!(output.status.success(), "Stop should report, not fail");

    let log: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = log.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|e| e["outcome"] == "failed"));
    assert!(entries[1]["detail"].as_str().unwrap().contains("i-ghost"));
}

/// Test an out-of-range threshold is rejected
#[test]
fn test_invalid_threshold_rejected() {
    let home = tempfile::tempdir().unwrap();
    let fleet = fleet_file(home.path());
    let output = cro(
        home.path(),
        &[
            "--fleet-file",
            fleet.to_str().unwrap(),
            "scan",
            "--threshold",
            "250",
        ],
    );

    assert!(!output.status.success(), "Invalid threshold should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("threshold"), "Should explain the problem");
}

/// Test a missing fleet file is reported
#[test]
fn test_missing_fleet_file() {
    let home = tempfile::tempdir().unwrap();
    let output = cro(
        home.path(),
        &["--fleet-file", "/nonexistent/instances.json", "scan"],
    );

    assert!(!output.status.success(), "Missing fleet file should fail");
}

/// Test metrics are written in Prometheus text format
#[test]
fn test_metrics_file() {
    let home = tempfile::tempdir().unwrap();
    let fleet = fleet_file(home.path());
    let metrics_path = home.path().join("cro.prom");

    let output = cro(
        home.path(),
        &[
            "--fleet-file",
            fleet.to_str().unwrap(),
            "--metrics-file",
            metrics_path.to_str().unwrap(),
            "scan",
        ],
    );

    assert!(output.status.success(), "Scan should succeed");
    let metrics = std::fs::read_to_string(&metrics_path).unwrap();
    assert!(metrics.contains("cloud_optimizer_instances_scanned_total 2"));
}

/// Test optimize writes the action log as text lines
#[test]
fn test_optimize_writes_action_log() {
    let home = tempfile::tempdir().unwrap();
    let fleet = fleet_file(home.path());
    let log_path = home.path().join("actions.log");

    let output = cro(
        home.path(),
        &[
            "--fleet-file",
            fleet.to_str().unwrap(),
            "optimize",
            "--log-output",
            log_path.to_str().unwrap(),
        ],
    );

    assert!(output.status.success(), "Optimize should succeed");
    let log = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(log, "[ACTION] Stopped instance: i-batch\n");
}

/// Test a lookback too large to express fails cleanly
#[test]
fn test_oversized_lookback_rejected() {
    let home = tempfile::tempdir().unwrap();
    let fleet = fleet_file(home.path());
    let output = cro(
        home.path(),
        &[
            "--fleet-file",
            fleet.to_str().unwrap(),
            "scan",
            "--lookback-days",
            "100000000",
        ],
    );

    assert!(!output.status.success(), "Oversized lookback should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.contains("panicked"), "Should not panic: {}", stderr);
    assert!(stderr.contains("lookback"), "Should explain the problem");
}
