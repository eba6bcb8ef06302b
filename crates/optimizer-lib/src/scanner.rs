//! Fleet scanning
//!
//! Lists running instances, fetches their utilization concurrently on a
//! bounded pool and classifies each one. Per-instance metrics failures become
//! report rows; only an inventory failure aborts the scan. Rows are always
//! returned sorted by instance identifier, whatever order fetches finish in.

use crate::classifier::IdleClassifier;
use crate::config::ScanConfig;
use crate::error::{provider_detail, OptimizerError, Result};
use crate::gateway::MetricsGateway;
use crate::models::{
    Instance, InstanceState, LookbackWindow, ReportRow, RowOutcome, ScanReport, UtilizationSample,
};
use crate::observability::{OptimizerMetrics, StructuredLogger};
use crate::provider::{InventoryProvider, MonitoringProvider};
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, warn};

type FetchOutcome = (Instance, Result<Vec<UtilizationSample>>);

/// Scans a fleet for idle instances
pub struct FleetScanner {
    inventory: Arc<dyn InventoryProvider>,
    monitoring: Arc<dyn MonitoringProvider>,
    metrics: OptimizerMetrics,
}

impl FleetScanner {
    pub fn new(
        inventory: Arc<dyn InventoryProvider>,
        monitoring: Arc<dyn MonitoringProvider>,
    ) -> Self {
        Self {
            inventory,
            monitoring,
            metrics: OptimizerMetrics::new(),
        }
    }

    /// Run a scan, honouring `config.scan_timeout` if set
    pub async fn scan(&self, config: &ScanConfig) -> Result<ScanReport> {
        self.run(config, None).await
    }

    /// Run a scan that also stops early when `shutdown` fires
    ///
    /// A dropped sender does not count as a shutdown request.
    pub async fn scan_with_shutdown(
        &self,
        config: &ScanConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<ScanReport> {
        self.run(config, Some(shutdown)).await
    }

    async fn run(
        &self,
        config: &ScanConfig,
        shutdown: Option<broadcast::Receiver<()>>,
    ) -> Result<ScanReport> {
        config.validate()?;
        let classifier = IdleClassifier::new(config.threshold_percent, config.min_idle_periods)?;
        let lookback = chrono::Duration::from_std(config.lookback)
            .map_err(|_| OptimizerError::invalid("lookback window is too large"))?;

        let window = LookbackWindow::ending_at(Utc::now(), lookback).ok_or_else(|| {
            OptimizerError::invalid("lookback window reaches outside the date range")
        })?;

        let started = Instant::now();
        let deadline = match config.scan_timeout {
            Some(timeout) => Some(
                started
                    .checked_add(timeout)
                    .ok_or_else(|| OptimizerError::invalid("scan timeout is too large"))?,
            ),
            None => None,
        };
        let logger = StructuredLogger::new(&config.region);
        let mut cancel = Cancellation { deadline, shutdown };

        let instances = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(OptimizerError::InventoryUnavailable {
                    region: config.region.clone(),
                    detail: "scan cancelled before the inventory was listed".to_string(),
                });
            }
            listed = self.inventory.list_instances(&config.region, &InstanceState::Running) => {
                listed.map_err(|e| OptimizerError::InventoryUnavailable {
                    region: config.region.clone(),
                    detail: provider_detail(&e),
                })?
            }
        };
        let instances = running_only(instances);
        logger.log_scan_started(
            instances.len(),
            config.threshold_percent,
            config.min_idle_periods,
        );

        let gateway = MetricsGateway::new(
            self.monitoring.clone(),
            config.period,
            config.fetch_timeout,
        );

        let mut pool = FetchPool::new(instances, config.max_concurrent_fetches);
        let cancelled = pool.drive(&gateway, window, &mut cancel).await;
        let FetchPool {
            queue,
            in_flight,
            outcomes,
            ..
        } = pool;

        let mut rows: Vec<ReportRow> = outcomes
            .into_iter()
            .map(|(instance, result)| self.evaluate(&classifier, &logger, instance, result))
            .collect();

        let mut unevaluated = Vec::new();
        if cancelled {
            unevaluated.extend(in_flight.into_keys());
            unevaluated.extend(queue.into_iter().map(|instance| instance.instance_id));
            unevaluated.sort();
        } else {
            // Only tasks that panicked can still be here
            for (_, instance) in in_flight {
                let detail = "metrics fetch task terminated unexpectedly".to_string();
                self.metrics.inc_instances_scanned();
                self.metrics.inc_metrics_fetch_errors();
                logger.log_metrics_unavailable(&instance.instance_id, &detail);
                rows.push(ReportRow {
                    instance,
                    outcome: RowOutcome::MetricsUnavailable { detail },
                });
            }
        }

        rows.sort_by(|a, b| a.instance.instance_id.cmp(&b.instance.instance_id));

        let report = ScanReport {
            region: config.region.clone(),
            threshold_percent: config.threshold_percent,
            min_idle_periods: config.min_idle_periods,
            window,
            rows,
            complete: !cancelled,
            unevaluated,
            generated_at: Utc::now(),
        };

        let elapsed = started.elapsed();
        self.metrics.observe_scan_duration(elapsed.as_secs_f64());
        logger.log_scan_completed(
            report.rows.len(),
            report.idle_count(),
            report.failed_count(),
            report.unevaluated.len(),
            elapsed.as_millis(),
        );

        Ok(report)
    }

    fn evaluate(
        &self,
        classifier: &IdleClassifier,
        logger: &StructuredLogger,
        instance: Instance,
        fetched: Result<Vec<UtilizationSample>>,
    ) -> ReportRow {
        self.metrics.inc_instances_scanned();

        let outcome = match fetched {
            Ok(samples) => {
                let verdict = classifier.classify(&instance, &samples);
                logger.log_verdict(&verdict.instance_id, verdict.low_usage_periods, verdict.idle);
                if verdict.idle {
                    self.metrics.inc_idle_instances();
                }
                RowOutcome::Classified(verdict)
            }
            Err(err) => {
                let detail = match err {
                    OptimizerError::MetricsUnavailable { detail, .. } => detail,
                    other => other.to_string(),
                };
                self.metrics.inc_metrics_fetch_errors();
                logger.log_metrics_unavailable(&instance.instance_id, &detail);
                RowOutcome::MetricsUnavailable { detail }
            }
        };

        ReportRow { instance, outcome }
    }
}

/// Keep running instances only, sorted and unique by identifier
fn running_only(mut instances: Vec<Instance>) -> Vec<Instance> {
    let before = instances.len();
    instances.retain(|instance| instance.state.is_running());
    if instances.len() != before {
        debug!(
            dropped = before - instances.len(),
            "Inventory returned non-running instances, ignoring them"
        );
    }

    instances.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
    instances.dedup_by(|a, b| a.instance_id == b.instance_id);
    instances
}

/// Caller-initiated stop conditions for a scan
struct Cancellation {
    deadline: Option<Instant>,
    shutdown: Option<broadcast::Receiver<()>>,
}

impl Cancellation {
    /// Resolves once the deadline passes or a shutdown message arrives
    async fn cancelled(&mut self) {
        let deadline = self.deadline;
        let until_deadline = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        let shutdown = async {
            match self.shutdown.as_mut() {
                Some(rx) => {
                    if let Err(RecvError::Closed) = rx.recv().await {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = until_deadline => {}
            _ = shutdown => {}
        }
    }
}

enum Step {
    Cancelled,
    Dispatch(OwnedSemaphorePermit),
    Joined(std::result::Result<FetchOutcome, JoinError>),
}

/// Bounded set of in-flight metrics fetches
struct FetchPool {
    queue: VecDeque<Instance>,
    in_flight: BTreeMap<String, Instance>,
    outcomes: Vec<FetchOutcome>,
    tasks: JoinSet<FetchOutcome>,
    permits: Arc<Semaphore>,
}

impl FetchPool {
    fn new(instances: Vec<Instance>, max_in_flight: usize) -> Self {
        Self {
            queue: instances.into(),
            in_flight: BTreeMap::new(),
            outcomes: Vec::new(),
            tasks: JoinSet::new(),
            permits: Arc::new(Semaphore::new(max_in_flight)),
        }
    }

    /// Fetch until every instance is done or the scan is cancelled
    ///
    /// Returns true when cancelled. In-flight fetches are aborted on cancel.
    async fn drive(
        &mut self,
        gateway: &MetricsGateway,
        window: LookbackWindow,
        cancel: &mut Cancellation,
    ) -> bool {
        loop {
            if self.queue.is_empty() && self.tasks.is_empty() {
                return false;
            }

            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => Step::Cancelled,
                permit = self.permits.clone().acquire_owned(), if !self.queue.is_empty() => {
                    match permit {
                        Ok(permit) => Step::Dispatch(permit),
                        Err(_) => Step::Cancelled,
                    }
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    Step::Joined(joined)
                }
            };

            match step {
                Step::Cancelled => {
                    self.tasks.abort_all();
                    return true;
                }
                Step::Dispatch(permit) => {
                    let Some(instance) = self.queue.pop_front() else {
                        continue;
                    };
                    let gateway = gateway.clone();
                    self.in_flight.insert(instance.instance_id.clone(), instance.clone());
                    self.tasks.spawn(async move {
                        let _permit = permit;
                        let fetched = gateway
                            .fetch_utilization(&instance.instance_id, &window)
                            .await;
                        (instance, fetched)
                    });
                }
                Step::Joined(Ok((instance, fetched))) => {
                    self.in_flight.remove(&instance.instance_id);
                    self.outcomes.push((instance, fetched));
                }
                Step::Joined(Err(e)) => {
                    warn!(error = %e, "Metrics fetch task failed");
                }
            }
        }
    }
}
