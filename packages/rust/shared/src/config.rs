//! Application configuration for TexCal.
//!
//! User config lives at `~/.texcal/texcal.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TexcalError};
use crate::types::ApiKey;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "texcal.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".texcal";

// ---------------------------------------------------------------------------
// Config structs (matching texcal.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Extraction service settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Date/time resolution settings.
    #[serde(default)]
    pub resolution: ResolutionConfig,
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat model used for extraction.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[resolution]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// IANA time zone name. Uses the system zone when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

// ---------------------------------------------------------------------------
// Gateway config (runtime, derived from AppConfig)
// ---------------------------------------------------------------------------

/// Runtime gateway configuration, derived from the config file.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// API base URL (without the `/chat/completions` suffix).
    pub base_url: Url,
    /// Chat model ID.
    pub model: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl TryFrom<&AppConfig> for GatewayConfig {
    type Error = TexcalError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let base_url = Url::parse(&config.openai.base_url).map_err(|e| {
            TexcalError::config(format!(
                "invalid openai.base_url '{}': {e}",
                config.openai.base_url
            ))
        })?;

        if config.openai.timeout_secs == 0 {
            return Err(TexcalError::config("openai.timeout_secs must be at least 1"));
        }

        Ok(Self {
            base_url,
            model: config.openai.model.clone(),
            timeout: Duration::from_secs(config.openai.timeout_secs),
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.texcal/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| TexcalError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.texcal/texcal.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| TexcalError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| TexcalError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| TexcalError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| TexcalError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TexcalError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key from the configured env var.
pub fn resolve_api_key(config: &AppConfig) -> Result<ApiKey> {
    let var_name = &config.openai.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(ApiKey::new(val.trim())),
        _ => Err(TexcalError::config(format!(
            "OpenAI API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://platform.openai.com/settings/organization/api-keys"
        ))),
    }
}
