//! Controller configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tamago_core::{humantime_duration, TamagoError, TamagoResult};
use tamago_reconcile::ReconcilerConfig;

/// Log output settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
    /// Filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of compact text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Controller configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControllerConfig {
    /// Concurrent reconciliation workers
    pub workers: usize,
    /// How long to wait for the store's initial sync
    #[serde(with = "humantime_duration")]
    pub sync_timeout: Duration,
    /// Delay after the first failed reconcile of a key
    #[serde(with = "humantime_duration")]
    pub error_backoff_base: Duration,
    /// Upper bound on the failure delay
    #[serde(with = "humantime_duration")]
    pub error_backoff_max: Duration,
    pub log: LogConfig,
    pub reconciler: ReconcilerConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            workers: 2,
            sync_timeout: Duration::from_secs(30),
            error_backoff_base: Duration::from_millis(5),
            error_backoff_max: Duration::from_secs(300),
            log: LogConfig::default(),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Single worker, short timeouts; for local runs and tests
    pub fn local() -> Self {
        ControllerConfig {
            workers: 1,
            sync_timeout: Duration::from_secs(1),
            ..Default::default()
        }
    }

    /// Parse a JSON document; missing fields take their defaults
    pub fn from_json(raw: &str) -> TamagoResult<Self> {
        let config: ControllerConfig =
            serde_json::from_str(raw).map_err(|e| TamagoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> TamagoResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
            .map_err(|e| TamagoError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn validate(&self) -> TamagoResult<()> {
        if self.workers == 0 {
            return Err(TamagoError::Config("workers must be at least 1".into()));
        }
        if self.sync_timeout.is_zero() {
            return Err(TamagoError::Config("syncTimeout must be positive".into()));
        }
        if self.error_backoff_base > self.error_backoff_max {
            return Err(TamagoError::Config(
                "errorBackoffBase exceeds errorBackoffMax".into(),
            ));
        }
        self.reconciler.write_retry.validate()?;
        self.reconciler.init_retry.validate()?;
        Ok(())
    }
}
