//! Configuration management for Forge
//!
//! Settings live in `.forge/config.toml` under the project root. Every field
//! has a default, so a partial file (or no file at all) is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{ForgeError, Result};

/// Location of the config file relative to the project root
const CONFIG_PATH: &str = ".forge/config.toml";

/// Repository-level Forge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForgeConfig {
    /// Input and output locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Retry policy around LLM invocations
    #[serde(default)]
    pub retry: RetryConfig,

    /// Review loop settings
    #[serde(default)]
    pub review: ReviewConfig,

    /// Model selection
    #[serde(default)]
    pub models: ModelConfig,

    /// Manifest resolution
    #[serde(default)]
    pub manifest: ManifestConfig,
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Specification file read at startup
    #[serde(default = "default_spec_file")]
    pub spec_file: PathBuf,

    /// Base directory for timestamped project directories
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Transient area where stages write in-flight files
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
}

/// Retry policy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per invocation, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff multiplier in seconds
    #[serde(default = "default_multiplier_secs")]
    pub multiplier_secs: f64,

    /// Upper bound of the backoff window in seconds
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f64,

    /// Retry every error, not only rate limits and transient HTTP failures
    #[serde(default = "default_true")]
    pub retry_all_errors: bool,
}

/// Review loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Generation + review passes before proceeding without approval
    #[serde(default = "default_review_iterations")]
    pub max_iterations: usize,
}

/// Model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default model to use
    #[serde(default = "default_model")]
    pub default: String,

    /// Environment variable containing API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Maximum tokens per response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Manifest resolution settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Layout used when the LLM manifest is unusable
    #[serde(default)]
    pub fallback: ManifestFallback,
}

/// Which layout replaces an unusable manifest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFallback {
    /// The fixed `src/app.py` layout
    #[default]
    Fixed,
    /// File names derived from keywords in the specification
    Heuristic,
}

// Default value providers
fn default_spec_file() -> PathBuf {
    PathBuf::from("config/project_spec.txt")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("generated_projects")
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from(".forge/staging")
}

fn default_max_attempts() -> u32 {
    5
}

fn default_multiplier_secs() -> f64 {
    1.0
}

fn default_max_delay_secs() -> f64 {
    60.0
}

fn default_true() -> bool {
    true
}

fn default_review_iterations() -> usize {
    1
}

fn default_model() -> String {
    "sonnet".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_max_tokens() -> usize {
    16000
}

fn default_request_timeout_secs() -> u64 {
    300
}

impl ForgeConfig {
    /// Load configuration from `.forge/config.toml` or use defaults
    pub fn load_or_default(repo_root: &Path) -> Result<Self> {
        Self::load_from(&repo_root.join(CONFIG_PATH))
    }

    /// Load configuration from an explicit file, defaulting when it is absent
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config: Self = toml::from_str(&content).map_err(|e| {
                ForgeError::Config(format!(
                    "Failed to parse config file {}: {}",
                    config_path.display(),
                    e
                ))
            })?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values that parse but cannot be used
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()
    }

    /// Write default configuration to `.forge/config.toml`
    pub fn write_default(repo_root: &Path) -> Result<PathBuf> {
        let config_path = repo_root.join(CONFIG_PATH);
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| ForgeError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(config_path)
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        for (key, secs) in [
            ("multiplier_secs", self.multiplier_secs),
            ("max_delay_secs", self.max_delay_secs),
        ] {
            Duration::try_from_secs_f64(secs).map_err(|e| {
                ForgeError::Config(format!(
                    "[retry] {} = {} is not a duration: {}",
                    key, secs, e
                ))
            })?;
        }
        Ok(())
    }

    /// Backoff multiplier as a duration
    pub fn multiplier(&self) -> Duration {
        secs_to_duration(self.multiplier_secs)
    }

    /// Backoff cap as a duration
    pub fn max_delay(&self) -> Duration {
        secs_to_duration(self.max_delay_secs)
    }
}

/// Negative and NaN clamp to zero, out-of-range values saturate
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            spec_file: default_spec_file(),
            output_dir: default_output_dir(),
            staging_dir: default_staging_dir(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            multiplier_secs: default_multiplier_secs(),
            max_delay_secs: default_max_delay_secs(),
            retry_all_errors: default_true(),
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_review_iterations(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
