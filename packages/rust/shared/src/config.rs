//! Application configuration for paperscout.
//!
//! User config lives at `~/.paperscout/paperscout.toml`. The config is
//! loaded once at process start and passed by reference into every
//! collaborator constructor; there is no global lookup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PaperScoutError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "paperscout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".paperscout";

// ---------------------------------------------------------------------------
// Config structs (matching paperscout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Model collaborator settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Upstream source settings.
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root directory for all durable artifacts (raw listings, enriched
    /// datasets, judgment cache database, run outputs).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// How many papers between partial-result flushes (1 = every paper).
    #[serde(default = "default_flush_interval")]
    pub partial_flush_interval: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            partial_flush_interval: default_flush_interval(),
        }
    }
}

fn default_data_dir() -> String {
    "~/paperscout-data".into()
}
fn default_flush_interval() -> usize {
    1
}

/// `[model]` section — the OpenAI-compatible chat-completions collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the chat-completions endpoint.
    #[serde(default = "default_model_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model identifier sent with every request.
    #[serde(default = "default_model_name")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Per-call timeout in seconds.
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,

    /// Retry attempts per invocation.
    #[serde(default = "default_model_retries")]
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_model_base_url(),
            api_key_env: default_api_key_env(),
            model: default_model_name(),
            temperature: default_temperature(),
            timeout_secs: default_model_timeout(),
            max_retries: default_model_retries(),
        }
    }
}

fn default_model_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model_name() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f64 {
    0.3
}
fn default_model_timeout() -> u64 {
    60
}
fn default_model_retries() -> u32 {
    3
}

/// `[sources]` section — upstream catalog endpoints and fetch policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Primary bibliography catalog base URL.
    #[serde(default = "default_catalog_base_url")]
    pub catalog_base_url: String,

    /// Secondary scholarly-metadata API base URL.
    #[serde(default = "default_scholar_base_url")]
    pub scholar_base_url: String,

    /// Minimum ms between successive listing requests.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Retry attempts per listing fetch.
    #[serde(default = "default_source_retries")]
    pub max_retries: u32,

    /// Delay between retries, in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            catalog_base_url: default_catalog_base_url(),
            scholar_base_url: default_scholar_base_url(),
            rate_limit_ms: default_rate_limit(),
            max_retries: default_source_retries(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

fn default_catalog_base_url() -> String {
    "https://dblp.org".into()
}
fn default_scholar_base_url() -> String {
    "https://api.semanticscholar.org".into()
}
fn default_rate_limit() -> u64 {
    5000
}
fn default_source_retries() -> u32 {
    5
}
fn default_retry_delay() -> u64 {
    10
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.paperscout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PaperScoutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.paperscout/paperscout.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PaperScoutError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| PaperScoutError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PaperScoutError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PaperScoutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PaperScoutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Resolve the configured data directory, expanding a leading `~/`.
pub fn resolve_data_dir(config: &AppConfig) -> Result<PathBuf> {
    let raw = &config.defaults.data_dir;
    if let Some(rest) = raw.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| PaperScoutError::config("could not determine home directory"))?;
        Ok(home.join(rest))
    } else {
        Ok(PathBuf::from(raw))
    }
}

/// Check that the model API key env var is set and non-empty, returning the key.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.model.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(PaperScoutError::config(format!(
            "model API key not found. Set the {var_name} environment variable."
        ))),
    }
}
