//! Configuration schema (pbischema.toml)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `data_dir`
pub const DATA_DIR_ENV: &str = "PBISCHEMA_DATA_DIR";

/// PBIX package layout and reading limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PbixConfig {
    /// Substring identifying the schema JSON entry
    pub schema_marker: String,

    /// Exact name of the binary model entry
    pub data_model_entry: String,

    /// Exact name of the connections JSON entry
    pub connections_entry: String,

    /// Substring identifying layout entries
    pub layout_marker: String,

    /// Maximum number of entries a package may contain
    pub max_entries: usize,

    /// Maximum uncompressed size of a single entry (bytes)
    pub max_entry_bytes: u64,

    /// Maximum uncompressed bytes read from one package (bytes)
    pub max_total_bytes: u64,
}

impl Default for PbixConfig {
    fn default() -> Self {
        Self {
            schema_marker: "DataModelSchema".to_string(),
            data_model_entry: "DataModel".to_string(),
            connections_entry: "Connections".to_string(),
            layout_marker: "Layout".to_string(),
            max_entries: 10_000,
            max_entry_bytes: 100 * 1024 * 1024,
            max_total_bytes: 500 * 1024 * 1024,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding persisted schema snapshots
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// PBIX extraction settings
    #[serde(default)]
    pub pbix: PbixConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/schemas")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            pbix: PbixConfig::default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    ///
    /// A relative `data_dir` is resolved against the config file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_toml(&contents)?;

        if config.data_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.data_dir = parent.join(&config.data_dir);
            }
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;

        Ok(())
    }

    /// Apply `PBISCHEMA_DATA_DIR` if it is set and non-empty
    pub fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.data_dir, PathBuf::from("./data/schemas"));
        assert_eq!(config.pbix.schema_marker, "DataModelSchema");
        assert_eq!(config.pbix.layout_marker, "Layout");
    }

    #[test]
    fn partial_pbix_table_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            data_dir = "snapshots"

            [pbix]
            max_entries = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("snapshots"));
        assert_eq!(config.pbix.max_entries, 50);
        assert_eq!(config.pbix.connections_entry, "Connections");
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = Config::from_toml("data_dir = [").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config, parsed);
    }
}
