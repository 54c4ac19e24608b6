//! Service configuration
//!
//! Read from an explicit TOML file, or from the per-user config location
//! managed by confy (`tickwork/config.toml` under the platform config dir).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::serde_defaults::{default_time_scale, default_true};

const APP_NAME: &str = "tickwork";
const CONFIG_NAME: &str = "config";

/// Errors during configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration")]
    Load(#[from] confy::ConfyError),

    #[error("failed to read config file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Multiplier for elapsed seconds of time-based timers (<= 0 means 1.0)
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,

    /// Log caught callback panics at warn level
    #[serde(default = "default_true")]
    pub log_faults: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            time_scale: default_time_scale(),
            log_faults: true,
        }
    }
}

impl ServiceConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Per-user configuration, created with defaults on first use
    pub fn load_user() -> Result<Self, ConfigError> {
        Ok(confy::load(APP_NAME, CONFIG_NAME)?)
    }

    /// Per-user configuration, or defaults if it cannot be read
    pub fn load_user_or_default() -> Self {
        Self::load_user().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default service configuration");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = ServiceConfig::from_toml_str("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.time_scale, 1.0);
        assert!(config.log_faults);
    }

    #[test]
    fn partial_config_overrides_fields() {
        let config = ServiceConfig::from_toml_str("time_scale = 2.5").unwrap();
        assert_eq!(config.time_scale, 2.5);
        assert!(config.log_faults);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = ServiceConfig::load(Path::new("/nonexistent/tickwork.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }
}
