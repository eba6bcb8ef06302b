//! Configuration management for the CLI
//!
//! Settings are layered: built-in defaults, then the config file, then
//! `CRO_`-prefixed environment variables. Command-line flags are applied on
//! top by the caller.

use anyhow::{Context, Result};
use optimizer_lib::{ActionConfig, ScanConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Region or provider scope to scan
    pub region: String,
    /// Fleet snapshot file used as the provider
    pub fleet_file: PathBuf,
    /// Idle threshold in percent CPU
    pub threshold_percent: f64,
    /// Low-usage periods needed to call an instance idle
    pub min_idle_periods: u32,
    /// Lookback window in days
    pub lookback_days: u64,
    /// Sampling period in hours
    pub period_hours: u64,
    /// Metrics fetches in flight
    pub max_concurrent_fetches: usize,
    /// Per-fetch timeout in seconds
    pub fetch_timeout_secs: u64,
    /// Whole-scan deadline in seconds (unset means no deadline)
    #[serde(default)]
    pub scan_timeout_secs: Option<u64>,
    /// Instances per stop request
    pub batch_size: usize,
    /// Stop requests in flight
    pub max_concurrent_batches: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let scan = ScanConfig::default();
        let action = ActionConfig::default();
        Self {
            region: scan.region,
            fleet_file: PathBuf::from("instances.json"),
            threshold_percent: scan.threshold_percent,
            min_idle_periods: scan.min_idle_periods,
            lookback_days: scan.lookback.as_secs() / 86_400,
            period_hours: scan.period.as_secs() / 3_600,
            max_concurrent_fetches: scan.max_concurrent_fetches,
            fetch_timeout_secs: scan.fetch_timeout.as_secs(),
            scan_timeout_secs: None,
            batch_size: action.batch_size,
            max_concurrent_batches: action.max_concurrent_batches,
        }
    }
}

impl Settings {
    /// Load settings from `path` (or the default location) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();
        let file = match path {
            Some(path) => config::File::from(path.to_path_buf()).required(true),
            None => config::File::from(Self::config_path()?).required(false),
        };

        let settings = config::Config::builder()
            .set_default("region", defaults.region.clone())?
            .set_default("fleet_file", defaults.fleet_file.display().to_string())?
            .set_default("threshold_percent", defaults.threshold_percent)?
            .set_default("min_idle_periods", defaults.min_idle_periods as i64)?
            .set_default("lookback_days", defaults.lookback_days as i64)?
            .set_default("period_hours", defaults.period_hours as i64)?
            .set_default("max_concurrent_fetches", defaults.max_concurrent_fetches as i64)?
            .set_default("fetch_timeout_secs", defaults.fetch_timeout_secs as i64)?
            .set_default("batch_size", defaults.batch_size as i64)?
            .set_default("max_concurrent_batches", defaults.max_concurrent_batches as i64)?
            .add_source(file)
            .add_source(config::Environment::with_prefix("CRO").try_parsing(true))
            .build()
            .context("Failed to load configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Default configuration file path
    fn config_path() -> Result<PathBuf> {
        let home = dirs_next::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("cro").join("config.toml"))
    }

    /// Library scan configuration, failing on day or hour counts too large to express
    pub fn scan_config(&self) -> Result<ScanConfig> {
        let lookback = self
            .lookback_days
            .checked_mul(86_400)
            .with_context(|| format!("lookback_days {} is too large", self.lookback_days))?;
        let period = self
            .period_hours
            .checked_mul(3_600)
            .with_context(|| format!("period_hours {} is too large", self.period_hours))?;

        Ok(ScanConfig::new(self.region.clone())
            .threshold(self.threshold_percent)
            .min_idle_periods(self.min_idle_periods)
            .lookback(Duration::from_secs(lookback))
            .period(Duration::from_secs(period))
            .max_concurrent_fetches(self.max_concurrent_fetches)
            .fetch_timeout(Duration::from_secs(self.fetch_timeout_secs))
            .scan_timeout(self.scan_timeout_secs.map(Duration::from_secs)))
    }

    pub fn action_config(&self, dry_run: bool) -> ActionConfig {
        ActionConfig::default()
            .batch_size(self.batch_size)
            .max_concurrent_batches(self.max_concurrent_batches)
            .dry_run(dry_run)
    }
}
