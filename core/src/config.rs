//! Endpoint configuration, persisted as JSON in the user's home directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::batch::DEFAULT_BATCH_SIZE;

const CONFIG_DIR_NAME: &str = ".minecraft_translator";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Home directory could not be determined")]
    NoHomeDir,
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub api_url: String,
    pub api_port: String,
    pub model: String,
    pub api_key: String,
    pub use_api_key: bool,
    pub timeout_secs: u64,
    pub batch_size: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:11434/api/generate".into(),
            api_port: "11434".into(),
            model: "qwen2.5:1.5b".into(),
            api_key: String::new(),
            use_api_key: false,
            timeout_secs: 60,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl EndpointConfig {
    /// `~/.minecraft_translator/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Loads the file at `path`. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Loads `path`, writing the defaults there first when it does not exist.
    /// An unreadable file falls back to the defaults.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            let config = Self::default();
            if let Err(err) = config.to_json_file(path) {
                warn!("failed to write default config to {}: {}", path.display(), err);
            }
            return config;
        }

        match Self::from_json_file(path) {
            Ok(config) => config,
            Err(err) => {
                warn!("failed to load config from {}: {}", path.display(), err);
                Self::default()
            }
        }
    }

    /// The configured URL with `api_port` filled in when the URL names no
    /// port of its own.
    pub fn resolved_api_url(&self) -> String {
        let base = self.api_url.trim().trim_end_matches('/');
        let port = self.api_port.trim();

        match Url::parse(base) {
            Ok(mut url) if url.has_host() => {
                if url.port().is_none() && !base_names_port(base) {
                    if let Ok(port) = port.parse::<u16>() {
                        if url.set_port(Some(port)).is_err() {
                            return base.to_string();
                        }
                    }
                }
                url.as_str().trim_end_matches('/').to_string()
            }
            _ if port.is_empty() => base.to_string(),
            _ => format!("{base}:{port}"),
        }
    }

    /// The key to send as a bearer token, if one is enabled.
    pub fn bearer_token(&self) -> Option<String> {
        let key = self.api_key.trim();
        if self.use_api_key && !key.is_empty() {
            Some(key.to_string())
        } else {
            None
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("API URL must not be empty".into()));
        }
        let port = self.api_port.trim();
        if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Invalid("API port must be numeric".into()));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model name must not be empty".into()));
        }
        if self.use_api_key && self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "an API key is required when API key use is enabled".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch size must be at least 1".into()));
        }
        Ok(())
    }
}

/// `Url` hides a port equal to the scheme default, so look at the authority
/// text itself as well.
fn base_names_port(base: &str) -> bool {
    base.split_once("://")
        .map(|(_, rest)| rest.split('/').next().unwrap_or_default().contains(':'))
        .unwrap_or(false)
}
