use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_CHAT_MODEL: &str = "openai";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen";

/// Chat models offered by the backend. Image mode only offers `DEFAULT_IMAGE_MODEL`.
pub const CHAT_MODELS: &[&str] = &["claude", "openai"];

const API_URL_ENV: &str = "AETHEREUS_API_URL";
const MODEL_ENV: &str = "AETHEREUS_MODEL";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub chat_model: String,
    pub image_model: String,
    /// Where anonymous conversations are kept; `None` means the platform data dir
    pub data_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            data_dir: None,
            request_timeout_secs: 120,
        }
    }
}

impl ClientConfig {
    /// XDG-compliant location of the settings file
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::PathError)?;
        Ok(config_dir.join("aethereus").join("settings.json"))
    }

    /// Load settings from `path`, falling back to defaults on first run,
    /// then apply environment overrides.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if tokio::fs::try_exists(path).await? {
            let contents = tokio::fs::read_to_string(path).await?;
            serde_json::from_str(&contents)?
        } else {
            debug!(path = %path.display(), "No settings file, using defaults");
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(self)?;

        // Write atomically using temp file + rename
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, path).await?;

        Ok(())
    }

    fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.trim().is_empty()) {
            if !CHAT_MODELS.contains(&model.as_str()) {
                warn!(model = %model, "Unknown chat model requested, sending it anyway");
            }
            self.chat_model = model;
        }
    }

    /// Directory holding the anonymous key-value slots
    pub fn resolve_data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(dirs::data_dir()
                .ok_or(ConfigError::PathError)?
                .join("aethereus")),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
