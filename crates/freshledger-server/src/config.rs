use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use freshledger_types::LedgerConfig;

/// Log output format for the server binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Top-level configuration for the freshledger server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the HTTP surface binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Date layout, thresholds and index bounds handed to every component.
    #[serde(default)]
    pub ledger: LedgerConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_log_filter() -> String {
    "freshledger=info,tower_http=info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            log_format: default_log_format(),
            log_filter: default_log_filter(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load config from a TOML file. Returns default if not found.
    ///
    /// Inverted index bounds or thresholds are rejected here, before any
    /// component is built from them.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        config
            .ledger
            .validate()
            .context("Invalid ledger configuration")?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.ledger.reward_threshold, 80.0);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = ServerConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("freshledger.toml");
        let mut config = ServerConfig::default();
        config.log_format = LogFormat::Json;
        config.ledger.corrective_threshold = 40.0;
        config.save(&path).unwrap();

        let loaded = ServerConfig::load(&path).unwrap();
        assert_eq!(loaded.log_format, LogFormat::Json);
        assert_eq!(loaded.ledger, config.ledger);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("freshledger.toml");
        std::fs::write(&path, "bind_addr = \"127.0.0.1:9000\"\n\n[ledger]\nreward_threshold = 75.0\n")
            .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.ledger.reward_threshold, 75.0);
        assert_eq!(config.ledger.date_layout, "%Y-%m-%d");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("freshledger.toml");
        std::fs::write(&path, "bind_addr = [").unwrap();
        assert!(ServerConfig::load(&path).is_err());
    }

    #[test]
    fn test_inverted_index_bounds_are_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("freshledger.toml");
        std::fs::write(&path, "[ledger]\nindex_floor = 100.0\nindex_ceiling = 0.0\n").unwrap();
        let err = ServerConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("index_floor"));
    }
}
