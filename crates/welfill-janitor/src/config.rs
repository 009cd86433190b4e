//! Configuration for output sweeping

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the output sweeper
///
/// # Examples
///
/// ```
/// use welfill_janitor::SweeperConfig;
///
/// let config = SweeperConfig::default();
/// assert_eq!(config.retention_minutes, 60);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweeperConfig {
    /// Outputs older than this are deleted (minutes)
    /// Default: 60, long enough for a user to click download
    pub retention_minutes: u64,

    /// How often to sweep (minutes)
    /// Default: 10
    pub sweep_interval_minutes: u64,

    /// Log what would be deleted without deleting
    pub dry_run: bool,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            retention_minutes: 60,
            sweep_interval_minutes: 10,
            dry_run: false,
        }
    }
}

impl SweeperConfig {
    /// Get retention age as Duration
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_minutes * 60)
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_minutes * 60)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.sweep_interval_minutes == 0 {
            return Err("sweep_interval_minutes must be greater than 0".to_string());
        }
        if self.retention_minutes == 0 {
            return Err("retention_minutes must be greater than 0".to_string());
        }
        Ok(())
    }
}
