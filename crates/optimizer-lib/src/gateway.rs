//! Metrics gateway
//!
//! Wraps a [`MonitoringProvider`] and turns its raw answers into a clean,
//! strictly ascending sample sequence. Provider failures and timeouts become
//! [`OptimizerError::MetricsUnavailable`] so they are never mistaken for an
//! instance that simply has no data.

use crate::error::{provider_detail, OptimizerError, Result};
use crate::models::{LookbackWindow, UtilizationSample};
use crate::observability::OptimizerMetrics;
use crate::provider::{MetricsQuery, MonitoringProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Fetches per-period utilization averages for single instances
#[derive(Clone)]
pub struct MetricsGateway {
    provider: Arc<dyn MonitoringProvider>,
    /// Aggregation period requested from the provider
    period: Duration,
    /// Upper bound on one provider call
    fetch_timeout: Duration,
    metrics: OptimizerMetrics,
}

impl MetricsGateway {
    pub fn new(
        provider: Arc<dyn MonitoringProvider>,
        period: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            period,
            fetch_timeout,
            metrics: OptimizerMetrics::new(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Fetch samples for `instance_id` inside `window`, sorted by timestamp
    ///
    /// An empty vector means the provider answered with no datapoints.
    pub async fn fetch_utilization(
        &self,
        instance_id: &str,
        window: &LookbackWindow,
    ) -> Result<Vec<UtilizationSample>> {
        let query = MetricsQuery {
            instance_id: instance_id.to_string(),
            start: window.start,
            end: window.end,
            period: self.period,
        };

        let start = Instant::now();
        let response =
            tokio::time::timeout(self.fetch_timeout, self.provider.average_utilization(&query))
                .await;
        self.metrics.observe_fetch_latency(start.elapsed().as_secs_f64());

        let samples = match response {
            Ok(Ok(samples)) => samples,
            Ok(Err(e)) => {
                return Err(OptimizerError::MetricsUnavailable {
                    instance_id: instance_id.to_string(),
                    detail: provider_detail(&e),
                })
            }
            Err(_) => {
                return Err(OptimizerError::MetricsUnavailable {
                    instance_id: instance_id.to_string(),
                    detail: format!(
                        "monitoring provider did not answer within {}ms",
                        self.fetch_timeout.as_millis()
                    ),
                })
            }
        };

        let received = samples.len();
        let samples = normalize_samples(samples);
        if samples.len() != received {
            debug!(
                instance_id = %instance_id,
                received = received,
                kept = samples.len(),
                "Dropped duplicate utilization timestamps"
            );
        }

        Ok(samples)
    }
}

/// Sort ascending by timestamp and collapse duplicate timestamps
///
/// The sort is stable so the first sample reported for a timestamp wins.
fn normalize_samples(mut samples: Vec<UtilizationSample>) -> Vec<UtilizationSample> {
    samples.sort_by_key(|sample| sample.timestamp);
    samples.dedup_by_key(|sample| sample.timestamp);
    samples
}
