//! Capability traits for the external cloud APIs
//!
//! The pipeline never constructs provider clients itself. Callers build one
//! client per process run and hand it in as an `Arc<dyn ...>`, which keeps the
//! scanner and executor testable without network access.

use crate::models::{Instance, InstanceState, UtilizationSample};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;

pub use async_trait::async_trait;

/// Read-only access to the instance inventory
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// List instances in `region` whose lifecycle state matches `state`
    async fn list_instances(&self, region: &str, state: &InstanceState) -> Result<Vec<Instance>>;
}

/// A utilization query for one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsQuery {
    pub instance_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Aggregation period for each returned average
    pub period: Duration,
}

/// Read-only access to a time-series monitoring service
#[async_trait]
pub trait MonitoringProvider: Send + Sync {
    /// Per-period average CPU utilization for the queried instance
    ///
    /// Implementations may return samples in any order.
    async fn average_utilization(&self, query: &MetricsQuery) -> Result<Vec<UtilizationSample>>;
}

/// Write access for stopping instances
#[async_trait]
pub trait ComputeControl: Send + Sync {
    /// Stop every instance in the batch; success or failure is per batch
    async fn stop_instances(&self, instance_ids: &[String]) -> Result<()>;
}
