//! Idle classification
//!
//! Decides whether an instance is idle by counting the sampling periods whose
//! average CPU utilization fell strictly below a threshold. An instance is idle
//! once that count reaches the configured minimum. Short or empty histories are
//! never idle because the count cannot reach the minimum.

use crate::config::{validate_min_idle_periods, validate_threshold};
use crate::error::Result;
use crate::models::{Instance, UtilizationSample, Verdict};

/// Classifies instances as idle or active from their utilization history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleClassifier {
    /// Percentage below which a period counts as low usage
    threshold_percent: f64,
    /// Low-usage periods required for an idle verdict
    min_idle_periods: u32,
}

impl IdleClassifier {
    /// Create a classifier, rejecting thresholds outside 0-100 and a zero minimum
    pub fn new(threshold_percent: f64, min_idle_periods: u32) -> Result<Self> {
        validate_threshold(threshold_percent)?;
        validate_min_idle_periods(min_idle_periods)?;

        Ok(Self {
            threshold_percent,
            min_idle_periods,
        })
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    pub fn min_idle_periods(&self) -> u32 {
        self.min_idle_periods
    }

    /// Produce a verdict for one instance
    ///
    /// # Arguments
    /// * `instance` - Instance the samples belong to
    /// * `samples` - Per-period averages over the lookback window
    pub fn classify(&self, instance: &Instance, samples: &[UtilizationSample]) -> Verdict {
        let low_usage_periods = samples
            .iter()
            .filter(|sample| sample.average < self.threshold_percent)
            .count();

        Verdict {
            instance_id: instance.instance_id.clone(),
            low_usage_periods,
            idle: low_usage_periods >= self.min_idle_periods as usize,
        }
    }
}
