//! Stop execution for idle instances
//!
//! Identifiers are split into disjoint batches that are submitted
//! concurrently. Every requested identifier ends up with exactly one log
//! entry, in request order. A failed batch marks each of its identifiers as
//! failed and never turns into an error for the caller.

use crate::config::ActionConfig;
use crate::error::{provider_detail, OptimizerError, Result};
use crate::models::ActionLogEntry;
use crate::observability::{OptimizerMetrics, StructuredLogger};
use crate::provider::ComputeControl;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Issues stop requests and records what happened to each instance
pub struct ActionExecutor {
    control: Arc<dyn ComputeControl>,
    config: ActionConfig,
    logger: StructuredLogger,
    metrics: OptimizerMetrics,
}

impl ActionExecutor {
    /// Create an executor for `region`, validating the batch settings
    pub fn new(
        control: Arc<dyn ComputeControl>,
        region: impl Into<String>,
        config: ActionConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            control,
            config,
            logger: StructuredLogger::new(region),
            metrics: OptimizerMetrics::new(),
        })
    }

    /// Stop every listed instance and return one log entry per identifier
    ///
    /// An empty list yields a single informational entry.
    pub async fn stop(&self, instance_ids: &[String]) -> Vec<ActionLogEntry> {
        if instance_ids.is_empty() {
            info!(region = %self.logger.region(), "No idle instances to stop");
            return vec![ActionLogEntry::nothing_to_do()];
        }

        if self.config.dry_run {
            info!(
                region = %self.logger.region(),
                instances = instance_ids.len(),
                "Dry run, no stop requests sent"
            );
            return instance_ids
                .iter()
                .map(|id| ActionLogEntry::skipped(id.clone(), "dry run"))
                .collect();
        }

        self.metrics.add_stop_attempts(instance_ids.len());

        let batches: Vec<Vec<String>> = instance_ids
            .chunks(self.config.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_batches));
        let mut tasks = JoinSet::new();
        let mut pending: BTreeMap<usize, Vec<String>> = BTreeMap::new();

        for (index, batch) in batches.into_iter().enumerate() {
            pending.insert(index, batch.clone());
            let control = self.control.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                let outcome = submit_batch(control.as_ref(), &batch).await;
                (index, outcome)
            });
        }

        let mut results: BTreeMap<usize, Vec<ActionLogEntry>> = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    let Some(batch) = pending.remove(&index) else {
                        continue;
                    };
                    results.insert(index, self.record(batch, outcome));
                }
                Err(e) => warn!(error = %e, "Stop task failed"),
            }
        }

        // Batches whose task died never reported back
        for (index, batch) in pending {
            let outcome = Err(OptimizerError::ActionFailed {
                instance_ids: batch.clone(),
                detail: "stop task terminated unexpectedly".to_string(),
            });
            results.insert(index, self.record(batch, outcome));
        }

        results.into_values().flatten().collect()
    }

    /// Convert a batch outcome into per-instance log entries
    fn record(&self, batch: Vec<String>, outcome: Result<()>) -> Vec<ActionLogEntry> {
        match outcome {
            Ok(()) => batch
                .into_iter()
                .map(|id| {
                    self.logger.log_instance_stopped(&id);
                    ActionLogEntry::stopped(id)
                })
                .collect(),
            Err(err) => {
                let detail = match err {
                    OptimizerError::ActionFailed { detail, .. } => detail,
                    other => other.to_string(),
                };
                self.logger.log_stop_failed(&batch, &detail);
                self.metrics.add_stop_failures(batch.len());
                batch
                    .into_iter()
                    .map(|id| ActionLogEntry::failed(id, detail.clone()))
                    .collect()
            }
        }
    }
}

async fn submit_batch(control: &dyn ComputeControl, batch: &[String]) -> Result<()> {
    control
        .stop_instances(batch)
        .await
        .map_err(|e| OptimizerError::ActionFailed {
            instance_ids: batch.to_vec(),
            detail: provider_detail(&e),
        })
}
