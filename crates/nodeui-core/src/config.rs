//! Dashboard tuning values and the optional on-disk configuration file.
//!
//! [`DashboardConfig`] is an immutable value handed to every component at
//! construction. With the `config` feature enabled, an [`AppConfig`] can be
//! loaded from the platform config directory and layered under CLI flags.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::metrics::DEFAULT_ROUND_TIME;

/// Number of recent blocks kept in the window.
pub const DEFAULT_WINDOW_SIZE: usize = 25;

/// Balance readings kept per address.
pub const DEFAULT_HISTORY_DEPTH: usize = 3;

/// Inline notices kept for the footer.
pub const DEFAULT_NOTICE_CAPACITY: usize = 5;

/// Tuning values shared by all components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// Capacity of the block window.
    pub window_size: usize,
    /// Round time assumed before two rounds have been observed.
    pub default_round_time: Duration,
    /// Interval between balance poll cycles.
    pub balance_interval: Duration,
    /// Delay between plain status polls while a catchpoint catchup runs.
    pub catchup_refresh: Duration,
    /// Client-side limit on a long-poll status request. The node answers on
    /// its own after about a minute without a new round, so this stays above that.
    pub long_poll_client_timeout: Duration,
    /// Delay before retrying a block fetch that failed.
    pub tail_retry_delay: Duration,
    pub history_depth: usize,
    pub notice_capacity: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            default_round_time: DEFAULT_ROUND_TIME,
            balance_interval: Duration::from_secs(5),
            catchup_refresh: Duration::from_millis(100),
            long_poll_client_timeout: Duration::from_secs(90),
            tail_retry_delay: Duration::from_secs(2),
            history_depth: DEFAULT_HISTORY_DEPTH,
            notice_capacity: DEFAULT_NOTICE_CAPACITY,
        }
    }
}

/// User preferences read from `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Addresses to watch when none are given on the command line.
    #[serde(default)]
    pub watch_list: Vec<String>,
    /// Block window size override.
    #[serde(default)]
    pub window_size: Option<usize>,
    /// Balance poll interval override, in seconds.
    #[serde(default)]
    pub balance_interval_secs: Option<u64>,
}

impl AppConfig {
    /// Apply file overrides on top of `base`.
    pub fn apply(&self, base: DashboardConfig) -> DashboardConfig {
        DashboardConfig {
            window_size: self.window_size.filter(|n| *n > 0).unwrap_or(base.window_size),
            balance_interval: self
                .balance_interval_secs
                .filter(|s| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(base.balance_interval),
            ..base
        }
    }
}

#[cfg(feature = "config")]
pub use file::*;

#[cfg(feature = "config")]
mod file {
    use directories::ProjectDirs;
    use std::fs;
    use std::path::PathBuf;

    use super::AppConfig;

    /// Configuration error type.
    #[derive(Debug, thiserror::Error)]
    pub enum ConfigError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),
        #[error("{0}")]
        Other(String),
    }

    /// Platform config directory for the dashboard.
    pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("com", "algorand", "node-ui")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or_else(|| ConfigError::Other("Could not determine config directory".to_string()))
    }

    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        get_config_dir().map(|dir| dir.join("config.json"))
    }

    /// Load configuration from disk, defaulting when the file is absent.
    pub fn load_config() -> Result<AppConfig, ConfigError> {
        load_config_from(&get_config_path()?)
    }

    pub fn load_config_from(path: &std::path::Path) -> Result<AppConfig, ConfigError> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }
}
