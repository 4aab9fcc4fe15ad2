pub mod target_config;

use std::path::Path;

use anyhow::{Context, Result, bail};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::target_config::FixedTargetConfig;
use crate::core::blacklist::DEFAULT_BLACKLIST_CAPACITY;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Number of failed devices remembered before the oldest is forgotten.
    pub blacklist_capacity: usize,
    /// Poll period for battery instances that cannot notify, in milliseconds.
    pub battery_poll_interval_ms: u64,
    pub fixed_target: FixedTargetConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            blacklist_capacity: DEFAULT_BLACKLIST_CAPACITY,
            battery_poll_interval_ms: 2000,
            fixed_target: FixedTargetConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config from a JSON file, falling back to defaults when the
    /// file does not exist.
    pub async fn load_config(path: &Path) -> Result<Self> {
        let file_path_str = path.to_string_lossy().into_owned();

        if !path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path_str);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(path).await?;
        let config: Self = serde_json::from_str(&config_json)
            .with_context(|| format!("Invalid config file {}", file_path_str))?;
        config.validate()?;

        info!("Config loaded from {:?}", file_path_str);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.blacklist_capacity == 0 {
            bail!("blacklist_capacity must be at least 1");
        }
        if self.battery_poll_interval_ms == 0 {
            bail!("battery_poll_interval_ms must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::target_config::DisconnectPolicy;

    #[test]
    fn defaults_match_reference_behavior() {
        let config = AppConfig::default();
        assert_eq!(config.blacklist_capacity, 20);
        assert_eq!(config.battery_poll_interval_ms, 2000);
        assert_eq!(config.fixed_target.on_disconnect, DisconnectPolicy::Terminate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "fixed_target": { "on_disconnect": "retry" } }"#).unwrap();
        assert_eq!(config.blacklist_capacity, 20);
        assert_eq!(config.fixed_target.on_disconnect, DisconnectPolicy::Retry);
        assert_eq!(config.fixed_target.max_retries, 5);
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_config(&dir.path().join("absent.json"))
            .await
            .unwrap();
        assert_eq!(config.blacklist_capacity, 20);
    }

    #[tokio::test]
    async fn loads_values_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "blacklist_capacity": 4, "battery_poll_interval_ms": 500 }"#)
            .unwrap();

        let config = AppConfig::load_config(&path).await.unwrap();
        assert_eq!(config.blacklist_capacity, 4);
        assert_eq!(config.battery_poll_interval_ms, 500);
    }

    #[tokio::test]
    async fn rejects_zero_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "blacklist_capacity": 0 }"#).unwrap();

        assert!(AppConfig::load_config(&path).await.is_err());
    }

    #[tokio::test]
    async fn rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(AppConfig::load_config(&path).await.is_err());
    }
}
