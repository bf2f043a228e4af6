//! Config module - Manages discord-export configuration (config.toml).
//!
//! Configuration file contains:
//! - Discord API base URL
//! - Request timeout and retry budget
//! - Page size and default output directory

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Discord REST API v10.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v10/";

/// Largest page the Discord list endpoints accept for our queries.
pub const MAX_PAGE_LIMIT: usize = 100;

/// Main discord-export configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Base URL all endpoints are appended to (trailing slash)
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Timeout for a single HTTP attempt, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Items requested per page
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,

    /// Directory for exports when no output path is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_request_timeout_secs() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_page_limit() -> usize {
    MAX_PAGE_LIMIT
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            page_limit: default_page_limit(),
            output_dir: None,
        }
    }
}

/// Get default config directory (~/.config/discord-export/).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("discord-export"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get default config file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

impl Config {
    /// Load config from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Cannot parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from default path, falling back to defaults.
    pub fn load_default() -> Result<Self> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).with_context(|| "Cannot serialize config to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Cannot write config file: {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// API base with exactly one trailing slash.
    pub fn api_base(&self) -> String {
        format!("{}/", self.api_base.trim_end_matches('/'))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Page limit clamped to what the API accepts.
    pub fn page_limit(&self) -> usize {
        self.page_limit.clamp(1, MAX_PAGE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base, "https://discord.com/api/v10/");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.page_limit(), 100);
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let config: Config = toml::from_str("max_retries = 5\n")?;
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        Ok(())
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let config = Config {
            output_dir: Some(temp_dir.path().join("exports")),
            ..Config::default()
        };
        config.save(&config_path)?;

        let loaded = Config::load(&config_path)?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn test_api_base_normalized() {
        let config = Config {
            api_base: "http://localhost:8080/api//".to_string(),
            ..Config::default()
        };
        assert_eq!(config.api_base(), "http://localhost:8080/api/");
    }

    #[test]
    fn test_page_limit_clamped() {
        let mut config = Config::default();
        config.page_limit = 0;
        assert_eq!(config.page_limit(), 1);
        config.page_limit = 500;
        assert_eq!(config.page_limit(), 100);
    }

    #[test]
    #[cfg(unix)]
    fn test_save_permissions() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");

        Config::default().save(&config_path)?;

        let mode = std::fs::metadata(&config_path)?.permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        Ok(())
    }
}
