//! Configuration management for the vest relay
//!
//! Handles loading, parsing and validating the YAML configuration file.
//! Every field has a default, so a missing file yields a working relay.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::info;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Auto-reset watchdog configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct WatchdogConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How often the watchdog inspects the record
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Age of the last external write after which an active command is dropped
    #[serde(default = "default_auto_reset_seconds")]
    pub auto_reset_seconds: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            poll_interval_ms: default_poll_interval(),
            auto_reset_seconds: default_auto_reset_seconds(),
        }
    }
}

impl WatchdogConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn auto_reset_after(&self) -> Duration {
        Duration::from_secs_f64(self.auto_reset_seconds)
    }
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            info!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("server.host cannot be empty");
        }
        if self.watchdog.poll_interval_ms == 0 {
            anyhow::bail!("watchdog.poll_interval_ms must be greater than 0");
        }
        let secs = self.watchdog.auto_reset_seconds;
        if !secs.is_finite() || secs < 0.0 {
            anyhow::bail!(
                "watchdog.auto_reset_seconds must be a non-negative number (got {})",
                secs
            );
        }
        Ok(())
    }

    /// Address the HTTP server binds to
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid listen address: {}:{}",
                    self.server.host, self.server.port
                )
            })
    }
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { crate::api::DEFAULT_API_PORT }
fn default_true() -> bool { true }
fn default_poll_interval() -> u64 { 500 }
fn default_auto_reset_seconds() -> f64 { 2.0 }

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert!(config.watchdog.enabled);
        assert_eq!(config.watchdog.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.watchdog.auto_reset_after(), Duration::from_secs(2));
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = AppConfig::from_yaml(
            r#"
watchdog:
  auto_reset_seconds: 3.5
"#,
        )
        .unwrap();

        assert_eq!(config.server, ServerConfig::default());
        assert!(config.watchdog.enabled);
        assert_eq!(config.watchdog.poll_interval_ms, 500);
        assert_eq!(config.watchdog.auto_reset_after(), Duration::from_millis(3500));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(AppConfig::from_yaml("watchdog:\n  poll_interval_ms: 0\n").is_err());
        assert!(AppConfig::from_yaml("watchdog:\n  auto_reset_seconds: -1.0\n").is_err());
        assert!(AppConfig::from_yaml("server:\n  host: \"\"\n").is_err());
    }

    #[test]
    fn test_socket_addr() {
        let mut config = AppConfig::default();
        config.server.port = 8080;
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:8080");

        config.server.host = "not a host".to_string();
        assert!(config.socket_addr().is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            r#"
server:
  host: "127.0.0.1"
  port: 5050
watchdog:
  enabled: false
  poll_interval_ms: 250
"#,
        )?;

        let config = AppConfig::load(&config_path).await?;
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5050);
        assert!(!config.watchdog.enabled);
        assert_eq!(config.watchdog.poll_interval_ms, 250);
        assert_eq!(config.watchdog.auto_reset_seconds, 2.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_or_default_missing_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = AppConfig::load_or_default(temp_dir.path().join("absent.yaml")).await?;
        assert_eq!(config, AppConfig::default());
        Ok(())
    }

    #[tokio::test]
    async fn test_load_reports_parse_errors() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("broken.yaml");
        std::fs::write(&config_path, "server: [unterminated")?;

        let err = AppConfig::load(&config_path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML config"));
        Ok(())
    }
}
