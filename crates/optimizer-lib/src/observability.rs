//! Observability infrastructure for the optimizer
//!
//! Provides:
//! - Prometheus metrics (scan duration, fetch latency, verdict and stop counters)
//! - Structured event logging with tracing

use prometheus::{
    register_histogram, register_int_counter, Encoder, Histogram, IntCounter, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Buckets for per-instance metrics fetches (in seconds)
const FETCH_LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

/// Buckets for whole-fleet scans (in seconds)
const SCAN_DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<OptimizerMetricsInner> = OnceLock::new();

struct OptimizerMetricsInner {
    scan_duration_seconds: Histogram,
    fetch_latency_seconds: Histogram,
    instances_scanned: IntCounter,
    idle_instances_found: IntCounter,
    metrics_fetch_errors: IntCounter,
    stop_attempts: IntCounter,
    stop_failures: IntCounter,
}

impl OptimizerMetricsInner {
    fn new() -> Self {
        Self {
            scan_duration_seconds: register_histogram!(
                "cloud_optimizer_scan_duration_seconds",
                "Wall time of a full fleet scan",
                SCAN_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register scan_duration_seconds"),

            fetch_latency_seconds: register_histogram!(
                "cloud_optimizer_metrics_fetch_latency_seconds",
                "Time spent fetching utilization samples for one instance",
                FETCH_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register fetch_latency_seconds"),

            instances_scanned: register_int_counter!(
                "cloud_optimizer_instances_scanned_total",
                "Running instances evaluated by fleet scans"
            )
            .expect("Failed to register instances_scanned"),

            idle_instances_found: register_int_counter!(
                "cloud_optimizer_idle_instances_total",
                "Instances classified as idle"
            )
            .expect("Failed to register idle_instances_found"),

            metrics_fetch_errors: register_int_counter!(
                "cloud_optimizer_metrics_fetch_errors_total",
                "Per-instance metrics fetches that failed or timed out"
            )
            .expect("Failed to register metrics_fetch_errors"),

            stop_attempts: register_int_counter!(
                "cloud_optimizer_stop_attempts_total",
                "Instances submitted to the compute-control provider for stopping"
            )
            .expect("Failed to register stop_attempts"),

            stop_failures: register_int_counter!(
                "cloud_optimizer_stop_failures_total",
                "Instances whose stop request failed"
            )
            .expect("Failed to register stop_failures"),
        }
    }
}

/// Optimizer metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct OptimizerMetrics {
    _private: (),
}

impl Default for OptimizerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(OptimizerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &OptimizerMetricsInner {
        GLOBAL_METRICS.get_or_init(OptimizerMetricsInner::new)
    }

    pub fn observe_scan_duration(&self, duration_secs: f64) {
        self.inner().scan_duration_seconds.observe(duration_secs);
    }

    pub fn observe_fetch_latency(&self, duration_secs: f64) {
        self.inner().fetch_latency_seconds.observe(duration_secs);
    }

    pub fn inc_instances_scanned(&self) {
        self.inner().instances_scanned.inc();
    }

    pub fn inc_idle_instances(&self) {
        self.inner().idle_instances_found.inc();
    }

    pub fn inc_metrics_fetch_errors(&self) {
        self.inner().metrics_fetch_errors.inc();
    }

    pub fn add_stop_attempts(&self, count: usize) {
        self.inner().stop_attempts.inc_by(count as u64);
    }

    pub fn add_stop_failures(&self, count: usize) {
        self.inner().stop_failures.inc_by(count as u64);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Structured logger for pipeline events
///
/// Keeps event names and field sets consistent across the scanner and the
/// action executor.
#[derive(Clone)]
pub struct StructuredLogger {
    region: String,
}

impl StructuredLogger {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn log_scan_started(
        &self,
        instances: usize,
        threshold_percent: f64,
        min_idle_periods: u32,
    ) {
        info!(
            event = "scan_started",
            region = %self.region,
            instances = instances,
            threshold_percent = threshold_percent,
            min_idle_periods = min_idle_periods,
            "Fleet scan started"
        );
    }

    pub fn log_verdict(&self, instance_id: &str, low_usage_periods: usize, idle: bool) {
        debug!(
            event = "instance_classified",
            region = %self.region,
            instance_id = %instance_id,
            low_usage_periods = low_usage_periods,
            idle = idle,
            "Instance classified"
        );
    }

    pub fn log_metrics_unavailable(&self, instance_id: &str, detail: &str) {
        warn!(
            event = "metrics_unavailable",
            region = %self.region,
            instance_id = %instance_id,
            error = %detail,
            "Could not fetch utilization, instance left unclassified"
        );
    }

    pub fn log_scan_completed(
        &self,
        evaluated: usize,
        idle: usize,
        failed: usize,
        unevaluated: usize,
        elapsed_ms: u128,
    ) {
        if unevaluated == 0 {
            info!(
                event = "scan_completed",
                region = %self.region,
                evaluated = evaluated,
                idle = idle,
                failed = failed,
                elapsed_ms = elapsed_ms,
                "Fleet scan completed"
            );
        } else {
            warn!(
                event = "scan_cancelled",
                region = %self.region,
                evaluated = evaluated,
                idle = idle,
                failed = failed,
                unevaluated = unevaluated,
                elapsed_ms = elapsed_ms,
                "Fleet scan cancelled, returning partial report"
            );
        }
    }

    pub fn log_instance_stopped(&self, instance_id: &str) {
        info!(
            event = "instance_stopped",
            region = %self.region,
            instance_id = %instance_id,
            "Stopped idle instance"
        );
    }

    pub fn log_stop_failed(&self, instance_ids: &[String], detail: &str) {
        warn!(
            event = "instance_stop_failed",
            region = %self.region,
            instances = ?instance_ids,
            error = %detail,
            "Stop request failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimizer_metrics_render() {
        let metrics = OptimizerMetrics::new();

        metrics.observe_scan_duration(0.5);
        metrics.observe_fetch_latency(0.02);
        metrics.inc_instances_scanned();
        metrics.inc_idle_instances();
        metrics.inc_metrics_fetch_errors();
        metrics.add_stop_attempts(2);
        metrics.add_stop_failures(1);

        let text = metrics.render().unwrap();
        assert!(text.contains("cloud_optimizer_instances_scanned_total"));
        assert!(text.contains("cloud_optimizer_scan_duration_seconds_bucket"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("eu-west-1");
        assert_eq!(logger.region(), "eu-west-1");
    }
}
