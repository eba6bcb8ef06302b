//! File-backed fleet provider
//!
//! Loads a JSON fleet snapshot and serves it through all three provider
//! traits, which allows offline analysis and rehearsal runs. The file holds
//! an array of records like:
//!
//! ```json
//! [{"InstanceId": "i-0a1", "InstanceType": "t3.micro", "State": "running",
//!   "CPUHistory": [1.2, 0.8, 3.4]}]
//! ```
//!
//! `CPUHistory` lists one average per sampling period, oldest first, with the
//! last entry covering the period that ends at the query's window end. Stops
//! are simulated by flipping the in-memory state to `stopped`.

use crate::models::{Instance, InstanceState, UtilizationSample};
use crate::provider::{
    async_trait, ComputeControl, InventoryProvider, MetricsQuery, MonitoringProvider,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;

/// One instance as written in a snapshot file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnapshotRecord {
    pub instance_id: String,
    pub instance_type: String,
    pub state: String,
    #[serde(rename = "CPUHistory", default)]
    pub cpu_history: Vec<f64>,
}

#[derive(Debug, Clone)]
struct SnapshotEntry {
    instance: Instance,
    cpu_history: Vec<f64>,
}

/// In-memory fleet loaded from a snapshot
#[derive(Debug)]
pub struct FleetSnapshot {
    entries: RwLock<BTreeMap<String, SnapshotEntry>>,
}

impl FleetSnapshot {
    pub fn from_records(records: Vec<SnapshotRecord>) -> Self {
        let entries = records
            .into_iter()
            .map(|record| {
                let instance = Instance::new(
                    record.instance_id.clone(),
                    record.instance_type,
                    InstanceState::parse(&record.state),
                );
                (
                    record.instance_id,
                    SnapshotEntry {
                        instance,
                        cpu_history: record.cpu_history,
                    },
                )
            })
            .collect();

        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<SnapshotRecord> =
            serde_json::from_str(json).context("Failed to parse fleet snapshot")?;
        Ok(Self::from_records(records))
    }

    /// Load a snapshot file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read fleet snapshot {}", path.display()))?;
        let snapshot = Self::from_json(&content)?;
        let instances = snapshot.entries.read().await.len();
        info!(path = %path.display(), instances = instances, "Loaded fleet snapshot");
        Ok(snapshot)
    }

    /// Current state of an instance, if the snapshot knows it
    pub async fn state_of(&self, instance_id: &str) -> Option<InstanceState> {
        self.entries
            .read()
            .await
            .get(instance_id)
            .map(|entry| entry.instance.state.clone())
    }
}

#[async_trait]
impl InventoryProvider for FleetSnapshot {
    async fn list_instances(&self, _region: &str, state: &InstanceState) -> Result<Vec<Instance>> {
        let entries = self.entries.read().await;
        Ok(entries
            .values()
            .filter(|entry| &entry.instance.state == state)
            .map(|entry| entry.instance.clone())
            .collect())
    }
}

#[async_trait]
impl MonitoringProvider for FleetSnapshot {
    async fn average_utilization(&self, query: &MetricsQuery) -> Result<Vec<UtilizationSample>> {
        let history = {
            let entries = self.entries.read().await;
            entries
                .get(&query.instance_id)
                .map(|entry| entry.cpu_history.clone())
                .with_context(|| format!("Unknown instance {}", query.instance_id))?
        };

        let period = chrono::Duration::from_std(query.period)
            .context("Sampling period out of range")?;
        let count = history.len() as i32;

        Ok(history
            .into_iter()
            .enumerate()
            .map(|(i, average)| {
                let periods_back = count - i as i32;
                UtilizationSample::new(query.end - period * periods_back, average)
            })
            .filter(|sample| sample.timestamp >= query.start && sample.timestamp < query.end)
            .collect())
    }
}

#[async_trait]
impl ComputeControl for FleetSnapshot {
    async fn stop_instances(&self, instance_ids: &[String]) -> Result<()> {
        let mut entries = self.entries.write().await;

        // Reject the whole batch up front, like a real batch API would
        if let Some(unknown) = instance_ids.iter().find(|id| !entries.contains_key(*id)) {
            anyhow::bail!("InvalidInstanceID.NotFound: {}", unknown);
        }

        for id in instance_ids {
            if let Some(entry) = entries.get_mut(id) {
                entry.instance.state = InstanceState::Stopped;
            }
        }
        Ok(())
    }
}
