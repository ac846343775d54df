use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::search::filters::SearchFilters;
use crate::store::STORE_FILE_NAME;
use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Overrides the label proxy base URL
pub const PROXY_URL_ENV: &str = "REFILLR_PROXY_BASE_URL";
/// Overrides the openFDA API key
pub const FDA_KEY_ENV: &str = "REFILLR_FDA_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
    #[serde(default = "default_store_path")]
    pub store_path: String,
    #[serde(default = "default_proxy_base_url")]
    pub proxy_base_url: String,
    #[serde(default = "default_fda_base_url")]
    pub fda_base_url: String,
    #[serde(default)]
    pub fda_api_key: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default)]
    pub search: SearchFilters,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_version: Some(CURRENT_CONFIG_VERSION),
            store_path: default_store_path(),
            proxy_base_url: default_proxy_base_url(),
            fda_base_url: default_fda_base_url(),
            fda_api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            debounce_ms: default_debounce_ms(),
            search: SearchFilters::default(),
        }
    }
}

// Default value functions
fn default_config_version() -> Option<u32> {
    Some(CURRENT_CONFIG_VERSION)
}

fn default_store_path() -> String {
    // This is a fallback - actual profile will be determined at load time
    Config::default_store_path_for_profile(utils::Profile::Prod)
}

fn default_proxy_base_url() -> String {
    "https://refillr-proxy.vercel.app".to_string()
}

fn default_fda_base_url() -> String {
    "https://api.fda.gov".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_debounce_ms() -> u64 {
    350
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config directory: {0}")]
    ConfigDirError(String),
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from the profile's config file, or create it with
    /// defaults if missing. Environment overrides are applied last.
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        let mut config = if config_path.exists() {
            let mut config = Self::load_from(&config_path)?;
            // Keep the default store path in step with the profile
            if config.store_path == default_store_path() {
                config.store_path = Self::default_store_path_for_profile(profile);
            }
            config
        } else {
            let mut config = Config {
                store_path: Self::default_store_path_for_profile(profile),
                ..Config::default()
            };
            if let Err(e) = config.save_to(&config_path) {
                tracing::error!("Failed to save config file {:?}: {}", config_path, e);
                return Err(e);
            }
            config
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from an explicit file (the `--config` flag)
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("request_timeout_secs must be positive".to_string()));
        }
        if self.proxy_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue("proxy_base_url is empty".to_string()));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(url) = std::env::var(PROXY_URL_ENV).ok().filter(|v| !v.trim().is_empty()) {
            self.proxy_base_url = url;
        }
        if let Some(key) = std::env::var(FDA_KEY_ENV).ok().filter(|v| !v.trim().is_empty()) {
            self.fda_api_key = Some(key);
        }
    }

    /// Save configuration to the profile's config file
    pub fn save_with_profile(&mut self, profile: utils::Profile) -> Result<(), ConfigError> {
        let config_path = Self::get_config_path(profile)?;
        self.save_to(&config_path)
    }

    pub fn save_to(&mut self, config_path: &Path) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_path, toml_string).map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile)
            .ok_or_else(|| ConfigError::ConfigDirError("Could not determine config directory".to_string()))?;
        Ok(config_dir.join("config.toml"))
    }

    /// Default item file location for a specific profile
    fn default_store_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join(STORE_FILE_NAME).to_string_lossy().to_string()
        } else {
            match profile {
                utils::Profile::Dev => format!("~/.local/share/refillr-dev/{}", STORE_FILE_NAME),
                utils::Profile::Prod => format!("~/.local/share/refillr/{}", STORE_FILE_NAME),
            }
        }
    }

    /// Get the expanded store path (with ~ expansion)
    pub fn get_store_path(&self) -> PathBuf {
        utils::expand_path(&self.store_path)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::filters::{LabelStatus, SortOrder};
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("debounce_ms = 500\n[search]\nsort = \"newest\"\n").unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.proxy_base_url, "https://refillr-proxy.vercel.app");
        assert_eq!(config.search.sort, SortOrder::Newest);
        assert_eq!(config.search.status, LabelStatus::OnMarket);
        assert_eq!(config.fda_api_key, None);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config {
            store_path: "/tmp/items.json".to_string(),
            fda_api_key: Some("secret".to_string()),
            config_version: None,
            ..Config::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(config.config_version, Some(CURRENT_CONFIG_VERSION));

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.get_store_path(), PathBuf::from("/tmp/items.json"));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "request_timeout_secs = 0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "debounce_ms = \"soon\"\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::ParseError(_))));
    }
}
