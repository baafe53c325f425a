//! Configuration for qagen.
//!
//! Everything tunable lives here: backend endpoint, concurrency and retry
//! limits, extraction windows, and output paths. The config file is optional;
//! every field has a default matching the original extraction script.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Chat-completion backend settings
    #[serde(default)]
    pub backend: BackendConfig,

    /// Concurrency and retry limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Segmentation windows
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Checkpoint and failure-log paths
    #[serde(default)]
    pub output: OutputConfig,
}

/// Chat-completion backend configuration (OpenAI-compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// API key (can also be set via the env var named by `api_key_env`)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable name for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Base URL for the chat-completions API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model ID to prompt
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Completion token cap per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout() -> u64 {
    180
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Concurrency and retry configuration for the rate-limited caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum in-flight backend calls
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Attempts per prompt before a rate-limit error propagates
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Initial backoff after a rate-limit signal, in seconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_secs: u64,

    /// Backoff ceiling, in seconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

fn default_max_concurrent() -> usize {
    5
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    4
}

fn default_max_backoff() -> u64 {
    60
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            retry_attempts: default_retry_attempts(),
            initial_backoff_secs: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

/// Segmentation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Lines of trailing context kept after a snippet's closing fence
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Lines of leading context kept before a snippet's opening fence
    #[serde(default = "default_max_context_lines")]
    pub max_context_lines: usize,
}

fn default_context_window() -> usize {
    2
}

fn default_max_context_lines() -> usize {
    20
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            context_window: default_context_window(),
            max_context_lines: default_max_context_lines(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Checkpoint store path (JSONL of emitted pairs)
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,

    /// Failure log path (JSONL of prompts whose answer step failed)
    #[serde(default = "default_failed_log_path")]
    pub failed_log_path: PathBuf,
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("output_data/qa_pairs.jsonl")
}

fn default_failed_log_path() -> PathBuf {
    PathBuf::from("failed_questions.jsonl")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: default_checkpoint_path(),
            failed_log_path: default_failed_log_path(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Load from a TOML file if it exists, otherwise use defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the API key from config or environment.
    ///
    /// Absence is a fatal startup condition.
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.backend.api_key {
            return Ok(expand_env_vars(key));
        }

        std::env::var(&self.backend.api_key_env).map_err(|_| ConfigError::MissingApiKey {
            env_var: self.backend.api_key_env.clone(),
        })
    }
}

/// Expand `${VAR_NAME}` placeholders from the environment.
///
/// Unset variables leave the placeholder unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let re = regex::Regex::new(r"\$\{([^}]+)\}").unwrap();

    for cap in re.captures_iter(s) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing API key: set {env_var} env var or api_key in config")]
    MissingApiKey { env_var: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_extraction_script() {
        let config = Config::default();
        assert_eq!(config.limits.max_concurrent, 5);
        assert_eq!(config.limits.retry_attempts, 5);
        assert_eq!(config.limits.initial_backoff_secs, 4);
        assert_eq!(config.limits.max_backoff_secs, 60);
        assert_eq!(config.extract.context_window, 2);
        assert_eq!(config.extract.max_context_lines, 20);
        assert_eq!(config.backend.max_tokens, 2048);
        assert_eq!(config.backend.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn parses_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [backend]
            model = "gpt-4o"

            [limits]
            max_concurrent = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.model, "gpt-4o");
        assert_eq!(config.limits.max_concurrent, 2);
        assert_eq!(config.limits.retry_attempts, 5);
    }

    #[test]
    fn expand_env_vars_leaves_unset_placeholders() {
        let out = expand_env_vars("${QAGEN_TEST_UNSET_VAR_XYZ}");
        assert_eq!(out, "${QAGEN_TEST_UNSET_VAR_XYZ}");
    }
}
