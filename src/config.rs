//! Relay configuration.
//!
//! Loaded from a YAML file. Every field has a serde default so a partial
//! file (or no file at all) yields a usable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "longwave.yaml";

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml_ng::Error),
}

/// Connection settings for the inference backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// API key; providers that don't check accept any value
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Model name passed through to the provider
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: default_base_url(),
            api_key: default_api_key(),
            model: default_model(),
        }
    }
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Inference backend connection settings
    #[serde(default)]
    pub backend: BackendConfig,
    /// Optional system prompt; `{date}` and `{time}` are expanded per request
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Maximum characters kept per text part during chain resolution
    #[serde(default = "default_max_text")]
    pub max_text: usize,
    /// Maximum number of chain entries resolved per trigger
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Platform cap on one visible message, in characters
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    /// Cache bound: entries beyond this are evicted oldest-first
    #[serde(default = "default_max_cached_nodes")]
    pub max_cached_nodes: usize,
    /// Minimum milliseconds between non-forced edits to a visible message
    #[serde(default = "default_edit_delay_ms")]
    pub edit_delay_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}

fn default_api_key() -> String {
    "sk-no-key-required".to_string()
}

fn default_model() -> String {
    "llama3.1".to_string()
}

fn default_max_text() -> usize {
    100_000
}

fn default_max_depth() -> usize {
    25
}

fn default_max_message_length() -> usize {
    4096
}

fn default_max_cached_nodes() -> usize {
    500
}

fn default_edit_delay_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Config {
            backend: BackendConfig::default(),
            system_prompt: None,
            max_text: default_max_text(),
            max_depth: default_max_depth(),
            max_message_length: default_max_message_length(),
            max_cached_nodes: default_max_cached_nodes(),
            edit_delay_ms: default_edit_delay_ms(),
        }
    }
}

impl Config {
    /// Load configuration from `path`.
    ///
    /// A missing file yields the defaults; a malformed file is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config = serde_yaml_ng::from_str(&contents)?;
        Ok(config)
    }

    /// Duration form of the edit delay.
    pub fn edit_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.edit_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_depth: 10").unwrap();
        writeln!(file, "backend:").unwrap();
        writeln!(file, "  model: gpt-4o").unwrap();
        file.flush().unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.backend.model, "gpt-4o");
        // Everything else keeps its default
        assert_eq!(config.max_cached_nodes, 500);
        assert_eq!(config.edit_delay_ms, 1000);
        assert_eq!(config.backend.base_url, default_base_url());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_depth: [not a number").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_edit_delay_duration() {
        let config = Config {
            edit_delay_ms: 250,
            ..Config::default()
        };
        assert_eq!(config.edit_delay(), std::time::Duration::from_millis(250));
    }
}
