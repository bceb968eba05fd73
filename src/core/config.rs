//! Configuration management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Inhibitor daemon connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InhibitorConfig {
    /// Daemon host
    #[serde(default = "default_host")]
    pub host: String,
    /// Primary daemon port
    #[serde(default = "default_main_port")]
    pub main_port: u16,
    /// Failover port tried when the primary is unreachable
    #[serde(default = "default_alt_port")]
    pub alt_port: u16,
    /// Seconds without a state update before a liveness refresh is sent
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    /// Run-loop tick interval in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_main_port() -> u16 {
    47675
}
fn default_alt_port() -> u16 {
    47676
}
fn default_refresh_secs() -> u64 {
    10
}
fn default_tick_ms() -> u64 {
    1000
}

impl Default for InhibitorConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            main_port: default_main_port(),
            alt_port: default_alt_port(),
            refresh_secs: default_refresh_secs(),
            tick_ms: default_tick_ms(),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Inhibitor daemon connection
    #[serde(default)]
    pub inhibitor: InhibitorConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;
            Ok(config)
        } else {
            // Return default config if file doesn't exist
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        // Create parent directories if needed
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "torrentdeck", "TorrentDeck")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.inhibitor.host, "127.0.0.1");
        assert_eq!(config.inhibitor.main_port, 47675);
        assert_eq!(config.inhibitor.alt_port, 47676);
        assert_eq!(config.inhibitor.refresh_secs, 10);
        assert_eq!(config.inhibitor.tick_ms, 1000);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.inhibitor.main_port, config.inhibitor.main_port);
    }

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let parsed: Config = toml::from_str("[inhibitor]\nhost = \"10.0.0.5\"\n").unwrap();
        assert_eq!(parsed.inhibitor.host, "10.0.0.5");
        assert_eq!(parsed.inhibitor.main_port, 47675);
    }
}
