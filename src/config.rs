//! LLM backend settings.
//!
//! Credentials come from a JSON file holding at least `OPENAI_API_KEY`.
//! When the file is absent the key is taken from the environment; command
//! line overrides are applied last.

use std::{env, fs, path::Path, time::Duration};

use anyhow::{Context, Result, bail};
use log::debug;
use serde::Deserialize;

pub const DEFAULT_CREDENTIALS_FILE: &str = "openai_creds.json";
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 120;

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(rename = "OPENAI_API_KEY")]
    api_key: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    temperature: Option<f32>,
    timeout_seconds: Option<u64>,
}

#[derive(Clone, PartialEq)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout: Duration,
}

// Keeps the key out of logs.
impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LlmOverrides {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    /// Resolves settings from `credentials`, falling back to the environment
    /// for the key when the file does not exist.
    pub fn load(credentials: &Path, overrides: &LlmOverrides) -> Result<Self> {
        let file = if credentials.is_file() {
            debug!("Reading LLM credentials from {credentials:?}");
            let raw = fs::read_to_string(credentials)
                .with_context(|| format!("Reading credentials file {credentials:?}"))?;
            Some(
                serde_json::from_str::<CredentialsFile>(&raw)
                    .with_context(|| format!("Parsing credentials file {credentials:?}"))?,
            )
        } else {
            None
        };
        Self::resolve(file, env::var(API_KEY_ENV).ok(), overrides)
            .with_context(|| format!("Resolving LLM settings from {credentials:?}"))
    }

    fn resolve(
        file: Option<CredentialsFile>,
        env_key: Option<String>,
        overrides: &LlmOverrides,
    ) -> Result<Self> {
        let file_key = file.as_ref().and_then(|f| f.api_key.clone());
        let Some(api_key) = file_key.or(env_key).filter(|k| !k.trim().is_empty()) else {
            bail!("No API key found; set {API_KEY_ENV} in the credentials file or environment");
        };
        let mut config = LlmConfig::new(api_key);
        if let Some(file) = file {
            if let Some(model) = file.model {
                config.model = model;
            }
            if let Some(base_url) = file.base_url {
                config.base_url = base_url;
            }
            if let Some(temperature) = file.temperature {
                config.temperature = temperature;
            }
            if let Some(seconds) = file.timeout_seconds {
                config.timeout = Duration::from_secs(seconds);
            }
        }
        if let Some(model) = &overrides.model {
            config.model = model.clone();
        }
        if let Some(base_url) = &overrides.base_url {
            config.base_url = base_url.clone();
        }
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(config)
    }
}
