use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::chat::staging::MAX_ATTACHMENTS;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/";
pub const API_URL_ENV: &str = "PIPCHAT_API_URL";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the assistant backend
    pub api_base_url: String,

    /// Pipchat home directory (config, credentials)
    #[serde(skip)]
    pub home_dir: PathBuf,

    /// Per-request timeout; chat requests have none unless configured
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Attachment staging behaviour
    #[serde(default)]
    pub attachments: AttachmentConfig,
}

/// What a file-picker selection does to files that are already staged.
///
/// Pasting always accumulates; only the picker honours `Replace`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PickerMode {
    #[default]
    Accumulate,
    Replace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentConfig {
    pub max_files: usize,
    pub picker_mode: PickerMode,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            max_files: MAX_ATTACHMENTS,
            picker_mode: PickerMode::Accumulate,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            api_base_url: DEFAULT_API_URL.to_string(),
            home_dir: home.join(".pipchat"),
            attachments: AttachmentConfig::default(),
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load configuration from `~/.pipchat/config.toml`
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Self::load_from(&home.join(".pipchat"))
    }

    /// Load configuration rooted at an explicit home directory
    pub fn load_from(home_dir: &Path) -> Result<Self> {
        fs::create_dir_all(home_dir)
            .context("Failed to create pipchat home directory")?;

        let config_path = home_dir.join("config.toml");
        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            toml::from_str(&content)
                .context("Failed to parse config file")?
        } else {
            Config::default()
        };

        config.home_dir = home_dir.to_path_buf();
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api_base_url = url;
            }
        }
        let max_files = config.attachments.max_files;
        if max_files == 0 || max_files > MAX_ATTACHMENTS {
            anyhow::bail!(
                "attachments.max_files must be between 1 and {}, got {}",
                MAX_ATTACHMENTS,
                max_files
            );
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        fs::create_dir_all(&self.home_dir)
            .context("Failed to create pipchat home directory")?;
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(self.config_path(), content)
            .context("Failed to write config file")?;
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.home_dir.join("config.toml")
    }

    /// Where the credential store lives
    pub fn auth_path(&self) -> PathBuf {
        self.home_dir.join("auth.json")
    }
}
