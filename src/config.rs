//! TOML configuration for the seatsniper daemon.
//!
//! Layered: an explicit `--config` path wins, then the `SEATSNIPER_CONFIG`
//! environment variable, then `seatsniper.toml` in the working directory,
//! then compiled-in defaults. Every section is optional in the file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::storage::store::DEFAULT_MAX_ATTEMPTS;

/// Root configuration for the daemon and CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SniperConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

fn default_db_path() -> String {
    "data/seatsniper.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause before the reload that follows a failed cycle.
    #[serde(default = "default_reload_delay_ms")]
    pub reload_delay_ms: u64,
    /// Storage re-read cadence while waiting for the target instant.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_user_agent() -> String {
    format!("seatsniper/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_reload_delay_ms() -> u64 {
    250
}

fn default_poll_interval_secs() -> u64 {
    2
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            reload_delay_ms: default_reload_delay_ms(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Attempt budget for courses without a stored per-course override.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl SniperConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve configuration from, in order: an explicit path, the
    /// `SEATSNIPER_CONFIG` environment variable, `seatsniper.toml` in the
    /// working directory, compiled-in defaults. An explicit path that fails
    /// to load is an error; fallback locations degrade with a warning.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var("SEATSNIPER_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "SEATSNIPER_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let local = Path::new("seatsniper.toml");
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(error = %e, "seatsniper.toml exists but could not be loaded, using defaults");
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SniperConfig::default();
        assert_eq!(cfg.registration.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(cfg.page.timeout_secs, 15);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let cfg: SniperConfig = toml::from_str(
            r#"
            [registration]
            max_attempts = 3

            [storage]
            db_path = "/tmp/sniper.db"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.registration.max_attempts, 3);
        assert_eq!(cfg.storage.db_path, "/tmp/sniper.db");
        // Untouched sections keep their defaults.
        assert_eq!(cfg.page.reload_delay_ms, 250);
    }

    #[test]
    fn test_load_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(SniperConfig::load(&missing).is_err());
    }
}
