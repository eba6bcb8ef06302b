//! Error taxonomy for the idle-detection pipeline

use thiserror::Error;

/// Errors raised by the optimizer core
///
/// Provider failures arrive as `anyhow::Error` and are flattened into the
/// `detail` strings here so that errors can be cloned into report rows.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    /// Metrics for a single instance could not be retrieved; the scan continues
    #[error("metrics unavailable for instance {instance_id}: {detail}")]
    MetricsUnavailable { instance_id: String, detail: String },

    /// Inventory could not be listed; nothing can be evaluated
    #[error("inventory unavailable for region {region}: {detail}")]
    InventoryUnavailable { region: String, detail: String },

    /// A stop batch was rejected by the compute-control provider
    #[error("stop failed for {} instance(s): {detail}", .instance_ids.len())]
    ActionFailed {
        instance_ids: Vec<String>,
        detail: String,
    },

    /// Rejected before any provider call was made
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),
}

impl OptimizerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        OptimizerError::ConfigurationInvalid(message.into())
    }

    /// Whether the scan can carry on past this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            OptimizerError::MetricsUnavailable { .. } | OptimizerError::ActionFailed { .. }
        )
    }
}

/// Render a provider error with its full context chain
pub(crate) fn provider_detail(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}

pub type Result<T> = std::result::Result<T, OptimizerError>;
