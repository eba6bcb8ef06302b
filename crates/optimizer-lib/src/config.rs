//! Scan and action configuration
//!
//! Both configurations are validated up front so that a bad threshold or
//! period count is rejected before any provider is contacted.

use crate::error::{OptimizerError, Result};
use std::time::Duration;

/// One day, the granularity of the reference CPU history
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Seven days of history
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Longest lookback accepted, ten years
pub const MAX_LOOKBACK: Duration = Duration::from_secs(3650 * 24 * 60 * 60);

/// Longest whole-scan deadline accepted, one week
pub const MAX_SCAN_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for a fleet scan
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Region or other provider scope identifier
    pub region: String,
    /// CPU percentage below which a period counts as low usage (0-100)
    pub threshold_percent: f64,
    /// Low-usage periods required to call an instance idle
    pub min_idle_periods: u32,
    /// How far back to look for samples
    pub lookback: Duration,
    /// Aggregation granularity requested from the monitoring provider
    pub period: Duration,
    /// Maximum number of metrics fetches in flight
    pub max_concurrent_fetches: usize,
    /// Timeout for a single metrics fetch
    pub fetch_timeout: Duration,
    /// Deadline for the whole scan; a partial report is returned when it passes
    pub scan_timeout: Option<Duration>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            threshold_percent: 5.0,
            min_idle_periods: 3,
            lookback: DEFAULT_LOOKBACK,
            period: DEFAULT_PERIOD,
            max_concurrent_fetches: 8,
            fetch_timeout: Duration::from_secs(30),
            scan_timeout: None,
        }
    }
}

impl ScanConfig {
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    pub fn threshold(mut self, percent: f64) -> Self {
        self.threshold_percent = percent;
        self
    }

    pub fn min_idle_periods(mut self, periods: u32) -> Self {
        self.min_idle_periods = periods;
        self
    }

    pub fn lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = limit;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn scan_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Check every field; the first problem found is reported
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(OptimizerError::invalid("region must not be empty"));
        }
        validate_threshold(self.threshold_percent)?;
        validate_min_idle_periods(self.min_idle_periods)?;

        if self.period.is_zero() {
            return Err(OptimizerError::invalid("sampling period must be positive"));
        }
        if self.lookback < self.period {
            return Err(OptimizerError::invalid(format!(
                "lookback window ({}s) is shorter than one sampling period ({}s)",
                self.lookback.as_secs(),
                self.period.as_secs()
            )));
        }
        if self.lookback > MAX_LOOKBACK {
            return Err(OptimizerError::invalid(format!(
                "lookback window ({}s) exceeds the maximum of {}s",
                self.lookback.as_secs(),
                MAX_LOOKBACK.as_secs()
            )));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(OptimizerError::invalid(
                "max_concurrent_fetches must be at least 1",
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(OptimizerError::invalid("fetch timeout must be positive"));
        }
        if let Some(timeout) = self.scan_timeout {
            if timeout.is_zero() || timeout > MAX_SCAN_TIMEOUT {
                return Err(OptimizerError::invalid(format!(
                    "scan timeout must be between 1s and {}s, got {}s",
                    MAX_SCAN_TIMEOUT.as_secs(),
                    timeout.as_secs()
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_threshold(percent: f64) -> Result<()> {
    if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
        return Err(OptimizerError::invalid(format!(
            "threshold must be between 0 and 100 percent, got {}",
            percent
        )));
    }
    Ok(())
}

pub(crate) fn validate_min_idle_periods(periods: u32) -> Result<()> {
    if periods == 0 {
        return Err(OptimizerError::invalid(
            "min_idle_periods must be a positive count",
        ));
    }
    Ok(())
}

/// Configuration for the stop step
#[derive(Debug, Clone)]
pub struct ActionConfig {
    /// Identifiers submitted per provider call
    pub batch_size: usize,
    /// Disjoint batches allowed in flight at once
    pub max_concurrent_batches: usize,
    /// Log what would be stopped without calling the provider
    pub dry_run: bool,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_concurrent_batches: 4,
            dry_run: false,
        }
    }
}

impl ActionConfig {
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn max_concurrent_batches(mut self, limit: usize) -> Self {
        self.max_concurrent_batches = limit;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(OptimizerError::invalid("batch_size must be at least 1"));
        }
        if self.max_concurrent_batches == 0 {
            return Err(OptimizerError::invalid(
                "max_concurrent_batches must be at least 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_config_default() {
        let config = ScanConfig::default();
        assert_eq!(config.threshold_percent, 5.0);
        assert_eq!(config.min_idle_periods, 3);
        assert_eq!(config.period, Duration::from_secs(86_400));
        assert_eq!(config.lookback, Duration::from_secs(7 * 86_400));
        assert!(config.scan_timeout.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(ScanConfig::default().threshold(0.0).validate().is_ok());
        assert!(ScanConfig::default().threshold(100.0).validate().is_ok());
        assert!(ScanConfig::default().threshold(-0.1).validate().is_err());
        assert!(ScanConfig::default().threshold(100.5).validate().is_err());
        assert!(ScanConfig::default().threshold(f64::NAN).validate().is_err());
    }

    #[test]
    fn test_zero_min_idle_periods_rejected() {
        let err = ScanConfig::default().min_idle_periods(0).validate().unwrap_err();
        assert!(matches!(err, OptimizerError::ConfigurationInvalid(_)));
    }

    #[test]
    fn test_period_and_lookback() {
        assert!(ScanConfig::default()
            .period(Duration::ZERO)
            .validate()
            .is_err());
        assert!(ScanConfig::default()
            .lookback(Duration::from_secs(3600))
            .validate()
            .is_err());
        assert!(ScanConfig::default()
            .period(Duration::from_secs(3600))
            .lookback(Duration::from_secs(3600))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_huge_lookback_rejected() {
        let err = ScanConfig::default()
            .lookback(Duration::from_secs(100_000_000 * 86_400))
            .validate()
            .unwrap_err();
        assert!(matches!(err, OptimizerError::ConfigurationInvalid(_)));
        assert!(ScanConfig::default().lookback(MAX_LOOKBACK).validate().is_ok());
    }

    #[test]
    fn test_scan_timeout_bounds() {
        let err = ScanConfig::default()
            .scan_timeout(Some(Duration::from_secs(u64::MAX)))
            .validate()
            .unwrap_err();
        assert!(matches!(err, OptimizerError::ConfigurationInvalid(_)));
        assert!(ScanConfig::default()
            .scan_timeout(Some(Duration::ZERO))
            .validate()
            .is_err());
        assert!(ScanConfig::default()
            .scan_timeout(Some(MAX_SCAN_TIMEOUT))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_empty_region_rejected() {
        assert!(ScanConfig::new("  ").validate().is_err());
    }

    #[test]
    fn test_action_config_validation() {
        assert!(ActionConfig::default().validate().is_ok());
        assert!(ActionConfig::default().batch_size(0).validate().is_err());
        assert!(ActionConfig::default()
            .max_concurrent_batches(0)
            .validate()
            .is_err());
    }
}
