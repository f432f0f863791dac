//! Configuration for the completion API, request pacing and file locations.

use crate::{Error, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use toml::{from_str, to_string_pretty};

/// Environment variable consulted when no key is present in the config file.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Complete sibyl configuration.
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SibylConfig {
    /// Completion API access
    pub api: ApiConfig,
    /// Generation parameters
    pub generation: GenerationConfig,
    /// Retry backoff and inter-request delay
    pub pacing: PacingConfig,
    /// File locations
    pub paths: PathsConfig,
}

/// Completion API access settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API key; falls back to `OPENAI_API_KEY` when absent
    pub api_key: Option<String>,
    /// Base URL of the completions API
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// Timeout in seconds for a single HTTP request
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_owned(),
            model: "gpt-3.5-turbo-instruct".to_owned(),
            timeout_seconds: 120,
        }
    }
}

/// Generation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Maximum number of tokens to generate per prompt
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { max_tokens: 1 }
    }
}

/// Fixed delays applied around live requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Wait before retrying a transient failure
    pub retry_backoff_seconds: u64,
    /// Wait after every successful live request
    pub request_delay_seconds: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            retry_backoff_seconds: 20,
            request_delay_seconds: 5,
        }
    }
}

impl PacingConfig {
    /// Retry backoff as a [`Duration`].
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_seconds)
    }

    /// Inter-request delay as a [`Duration`].
    pub fn request_delay(&self) -> Duration {
        Duration::from_secs(self.request_delay_seconds)
    }
}

/// File locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Location of the persisted response cache
    pub cache_path: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from("data/completion_cache/cache.json"),
        }
    }
}

impl SibylConfig {
    /// Get the default config directory path (`~/.sibyl`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_dir() -> Result<PathBuf> {
        let home = home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_owned()))?;
        Ok(home.join(".sibyl"))
    }

    /// Get the default config file path (`~/.sibyl/config.toml`)
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from the default location (`~/.sibyl/config.toml`)
    /// If the config doesn't exist, creates it with default values
    ///
    /// # Errors
    /// Returns an error if the config cannot be read or created
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            let config = Self::default();
            config.save_to_file(&config_path)?;
            Ok(config)
        }
    }

    /// Load config from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = from_str(&contents)?;

        tracing::debug!(
            "Loaded config from {:?}: api_key={}, model={}",
            path,
            if config.api.api_key.is_some() {
                "present"
            } else {
                "missing"
            },
            config.api.model
        );

        Ok(config)
    }

    /// Save config to a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = to_string_pretty(self)
            .map_err(|error| Error::Config(format!("Failed to serialize config: {error}")))?;

        let header = "# Sibyl Configuration File\n\
                      # This file is automatically generated on first run\n\
                      # Edit this file to customize your settings\n\n";

        fs::write(path, format!("{header}{contents}"))?;

        Ok(())
    }

    /// Get the API key, checking config first, then the environment
    ///
    /// # Errors
    /// Returns `MissingApiKey` if neither source provides a non-empty key
    pub fn api_key(&self) -> Result<String> {
        self.api
            .api_key
            .clone()
            .filter(|key| !key.is_empty())
            .or_else(|| env::var(ENV_OPENAI_API_KEY).ok())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                Error::MissingApiKey(format!("{ENV_OPENAI_API_KEY} or config.toml api.api_key"))
            })
    }
}
