//! Client config load/save for `~/.rag-chat/config.yaml`.
//! Every field is optional; missing values fall back to the built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::DEFAULT_TIMEOUT;
use crate::messages::RetrievalParameters;
use crate::retry::RetryPolicy;

/// Backend used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Backend section (base_url, timeout_secs).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BackendSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Retrieval section (top_k, threshold).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RetrievalSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

/// Retry section (max_attempts, base_delay_ms, max_jitter_ms).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RetrySection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_jitter_ms: Option<u64>,
}

/// Widget section (state_path).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct WidgetSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub retrieval: RetrievalSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub widget: WidgetSection,
}

impl Config {
    pub fn base_url(&self) -> &str {
        self.backend.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Configured timeout, which may only shorten [`DEFAULT_TIMEOUT`].
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        let timeout = self
            .backend
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() || timeout > DEFAULT_TIMEOUT {
            return Err(ConfigError::Invalid(format!(
                "backend.timeout_secs must be between 1 and {}",
                DEFAULT_TIMEOUT.as_secs()
            )));
        }
        Ok(timeout)
    }

    pub fn retrieval_parameters(&self) -> Result<RetrievalParameters, ConfigError> {
        let defaults = RetrievalParameters::default();
        let top_k = self.retrieval.top_k.unwrap_or(defaults.top_k);
        let threshold = self.retrieval.threshold.unwrap_or(defaults.threshold);
        RetrievalParameters::new(top_k, threshold).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "retrieval.top_k must be positive and retrieval.threshold within [0, 1] (got {top_k}, {threshold})"
            ))
        })
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        let defaults = RetryPolicy::default();
        let max_attempts = self.retry.max_attempts.unwrap_or(defaults.max_attempts);
        if max_attempts == 0 || max_attempts > defaults.max_attempts {
            return Err(ConfigError::Invalid(format!(
                "retry.max_attempts must be between 1 and {}",
                defaults.max_attempts
            )));
        }
        Ok(RetryPolicy {
            max_attempts,
            base_delay: self
                .retry
                .base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_delay),
            max_jitter: self
                .retry
                .max_jitter_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_jitter),
        })
    }

    /// Configured state file, else `~/.rag-chat/state.json`.
    pub fn state_path(&self) -> Option<PathBuf> {
        self.widget.state_path.clone().or_else(default_state_path)
    }
}

/// Returns the default config file path: `~/.rag-chat/config.yaml` (platform-specific).
pub fn default_config_path() -> Option<PathBuf> {
    Some(app_dir()?.join("config.yaml"))
}

/// Returns the default widget state path: `~/.rag-chat/state.json`.
pub fn default_state_path() -> Option<PathBuf> {
    Some(app_dir()?.join("state.json"))
}

fn app_dir() -> Option<PathBuf> {
    Some(home_dir()?.join(".rag-chat"))
}

#[cfg(unix)]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(windows)]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE").map(PathBuf::from)
}

#[cfg(not(any(unix, windows)))]
fn home_dir() -> Option<PathBuf> {
    None
}

/// Load config from a YAML file.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(&contents)?)
}

/// Save config to a YAML file. Creates parent directory if missing.
pub fn save(path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Config load/save error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
