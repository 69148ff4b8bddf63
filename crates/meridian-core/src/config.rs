use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::MeridianError;

/// Top-level Meridian configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub meridian: MeridianConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub coach: CoachConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeridianConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for MeridianConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

/// Model backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Which backend to use: "openai" or "gemini".
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Request timeout in seconds.
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
    pub openai: Option<OpenAiModelConfig>,
    pub gemini: Option<GeminiModelConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            timeout_secs: default_model_timeout_secs(),
            openai: None,
            gemini: None,
        }
    }
}

/// OpenAI backend config with per-tier model names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiModelConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_openai_utility_model")]
    pub utility_model: String,
    #[serde(default = "default_openai_reasoning_model")]
    pub reasoning_model: String,
    #[serde(default = "default_openai_deep_think_model")]
    pub deep_think_model: String,
}

impl Default for OpenAiModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_openai_base_url(),
            utility_model: default_openai_utility_model(),
            reasoning_model: default_openai_reasoning_model(),
            deep_think_model: default_openai_deep_think_model(),
        }
    }
}

/// Gemini backend config with per-tier model names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiModelConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_gemini_utility_model")]
    pub utility_model: String,
    #[serde(default = "default_gemini_reasoning_model")]
    pub reasoning_model: String,
    #[serde(default = "default_gemini_deep_think_model")]
    pub deep_think_model: String,
}

impl Default for GeminiModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            utility_model: default_gemini_utility_model(),
            reasoning_model: default_gemini_reasoning_model(),
            deep_think_model: default_gemini_deep_think_model(),
        }
    }
}

/// Store config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

/// Response cache config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds a cached answer stays valid. Zero or negative disables caching.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachConfig {
    /// Day-event log depth.
    #[serde(default = "default_events_kept")]
    pub events_kept: usize,
    /// Recent exchanges surfaced in the coaching context.
    #[serde(default = "default_recent_conversations")]
    pub recent_conversations: usize,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            events_kept: default_events_kept(),
            recent_conversations: default_recent_conversations(),
        }
    }
}

// --- Default value functions ---

fn default_name() -> String {
    "Meridian".to_string()
}
fn default_data_dir() -> String {
    "~/.meridian".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_provider() -> String {
    "openai".to_string()
}
fn default_model_timeout_secs() -> u64 {
    20
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_openai_utility_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_openai_reasoning_model() -> String {
    "gpt-4o".to_string()
}
fn default_openai_deep_think_model() -> String {
    "o1".to_string()
}
fn default_gemini_utility_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_gemini_reasoning_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_gemini_deep_think_model() -> String {
    "gemini-2.0-pro".to_string()
}
fn default_db_path() -> String {
    "~/.meridian/meridian.db".to_string()
}
fn default_cache_ttl_secs() -> i64 {
    75
}
fn default_events_kept() -> usize {
    40
}
fn default_recent_conversations() -> usize {
    3
}

/// Expand `~` to home directory.
pub fn shellexpand(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist.
pub fn load(path: &str) -> Result<Config, MeridianError> {
    let path = Path::new(path);
    if !path.exists() {
        tracing::info!("Config file not found at {}, using defaults", path.display());
        return Ok(Config {
            meridian: MeridianConfig::default(),
            model: ModelConfig::default(),
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
            coach: CoachConfig::default(),
        });
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| MeridianError::Config(format!("failed to read {}: {}", path.display(), e)))?;

    let config: Config = toml::from_str(&content)
        .map_err(|e| MeridianError::Config(format!("failed to parse config: {}", e)))?;

    Ok(config)
}
