//! Extractor configuration.
//!
//! Resolution order (later wins):
//!   1. built-in defaults
//!   2. `config.toml` in the EchoNote home (`~/.echonote`, or `$ECHONOTE_HOME`)
//!   3. environment: `OPENAI_BASE_URL`, `ECHONOTE_BASE_URL`, `ECHONOTE_MODEL`
//!   4. command-line flags (applied by the binary)

use crate::{EchoNoteError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Settings for the hosted extraction model
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// OpenAI-compatible API root (without `/chat/completions`)
    pub base_url: String,

    pub model: String,

    /// Name of the environment variable holding the API key
    pub api_key_env: String,

    pub timeout_secs: u64,

    pub max_tokens: u32,

    pub temperature: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_tokens: 2048,
            temperature: 0.1,
        }
    }
}

/// Layout of `config.toml`
#[derive(Debug, Default, Deserialize)]
struct ConfigToml {
    #[serde(default)]
    extractor: Option<ExtractorConfig>,
}

impl ExtractorConfig {
    /// Load from `config_file` (if it exists) and apply environment overrides
    pub async fn load(config_file: &Path) -> Result<Self> {
        let mut config = Self::from_file(config_file).await?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        info!(
            "Extractor config resolved: model='{}', base_url='{}', timeout={}s",
            config.model, config.base_url, config.timeout_secs
        );
        Ok(config)
    }

    async fn from_file(config_file: &Path) -> Result<Self> {
        if !config_file.exists() {
            debug!("No config file at {:?}, using defaults", config_file);
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(config_file).await?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let parsed: ConfigToml = toml::from_str(content)
            .map_err(|e| EchoNoteError::Config(format!("invalid config.toml: {e}")))?;
        Ok(parsed.extractor.unwrap_or_default())
    }

    /// Apply environment overrides through `lookup` (injectable for tests)
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            self.base_url = url;
        }
        if let Some(url) = non_empty("ECHONOTE_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = non_empty("ECHONOTE_MODEL") {
            self.model = model;
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                EchoNoteError::Auth(format!(
                    "No API key found. Set {} or run with --offline.",
                    self.api_key_env
                ))
            })
    }
}

/// Get the EchoNote home directory
pub fn echonote_home() -> Result<PathBuf> {
    if let Ok(home) = std::env::var("ECHONOTE_HOME") {
        return Ok(PathBuf::from(home));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| EchoNoteError::Config("Could not find home directory".to_string()))?;
    Ok(home.join(".echonote"))
}
