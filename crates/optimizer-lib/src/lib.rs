//! Idle instance optimizer library
//!
//! This crate provides the core functionality for:
//! - Fetching per-period CPU utilization through a metrics gateway
//! - Classifying instances as idle or active
//! - Scanning a fleet concurrently into an ordered report
//! - Stopping idle instances with a per-instance action log
//! - Observability (Prometheus metrics, structured logging)

pub mod action;
pub mod classifier;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod observability;
pub mod provider;
pub mod scanner;
pub mod snapshot;

pub use action::ActionExecutor;
pub use classifier::IdleClassifier;
pub use config::{ActionConfig, ScanConfig};
pub use error::{OptimizerError, Result};
pub use gateway::MetricsGateway;
pub use models::*;
pub use observability::{OptimizerMetrics, StructuredLogger};
pub use provider::{ComputeControl, InventoryProvider, MetricsQuery, MonitoringProvider};
pub use scanner::FleetScanner;
pub use snapshot::FleetSnapshot;
