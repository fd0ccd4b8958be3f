//! ManagerConfig - ライフサイクルのポリシー設定

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Policy for job lifetimes, execution and background sweeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Destruction time assigned at creation when the client gives none.
    pub default_lifetime: Duration,

    /// Execution duration assigned at creation when the client gives none.
    /// `None` is unbounded.
    pub default_execution_duration: Option<Duration>,

    /// Expected run time used to compute `quote`. `None` leaves quote unset.
    pub quote_estimate: Option<Duration>,

    /// Jobs allowed in EXECUTING at once. Queued jobs start in arrival order.
    pub max_concurrent_jobs: usize,

    /// How long a cancelled worker gets to return before it is abandoned.
    pub abort_grace: Duration,

    pub sweep_interval: Duration,

    /// Archive terminal jobs this long after `end_time`. `None` disables it.
    pub archive_after: Option<Duration>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_lifetime: 30 * DAY,
            default_execution_duration: None,
            quote_estimate: None,
            max_concurrent_jobs: 8,
            abort_grace: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(60),
            archive_after: None,
        }
    }
}

impl ManagerConfig {
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_jobs == 0 {
            return Err("max_concurrent_jobs must be at least 1".to_string());
        }
        if self.sweep_interval.is_zero() {
            return Err("sweep_interval must be non-zero".to_string());
        }
        if self.default_lifetime.is_zero() {
            return Err("default_lifetime must be non-zero".to_string());
        }
        if self.default_execution_duration.is_some_and(|d| d.is_zero()) {
            return Err("default_execution_duration must be non-zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = ManagerConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.default_lifetime, Duration::from_secs(30 * 86_400));
        assert!(c.default_execution_duration.is_none());
        assert!(c.archive_after.is_none());
    }

    #[test]
    fn partial_config_fills_defaults() {
        let json = r#"{ "max_concurrent_jobs": 2, "abort_grace": { "secs": 1, "nanos": 0 } }"#;
        let c: ManagerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(c.max_concurrent_jobs, 2);
        assert_eq!(c.abort_grace, Duration::from_secs(1));
        assert_eq!(c.sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn zero_concurrency_is_invalid() {
        let c = ManagerConfig {
            max_concurrent_jobs: 0,
            ..ManagerConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn zero_sweep_interval_is_invalid() {
        let c = ManagerConfig {
            sweep_interval: Duration::ZERO,
            ..ManagerConfig::default()
        };
        assert!(c.validate().is_err());
    }
}
