//! Configuration Schema
//!
//! Defines the settings for the LLM provider and its key pool.

use crate::error::{KeyrotError, Result};
use crate::rotation::{clamp_cooldown_minutes, KeyEntry, DEFAULT_COOLDOWN_MINUTES};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Comma-separated list of API keys
pub const KEYS_ENV: &str = "KEYROTATE_API_KEYS";

/// Prefix of numbered key variables (`KEYROTATE_API_KEY_1`, `_2`, ...)
pub const NUMBERED_KEY_ENV_PREFIX: &str = "KEYROTATE_API_KEY_";

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "meta-llama/llama-3.3-70b-instruct:free";

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Chat provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Environment variable names containing API keys
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys_env: Vec<String>,

    /// Raw API keys (alternative to keys_env)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,

    /// Cooldown applied to a rate-limited key, clamped to 1..=1440
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u64,

    /// Where cooldown state is persisted (platform data dir when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,
}

/// Configuration for the OpenAI-compatible chat provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL for the API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Additional headers to send with requests
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// System prompt prepended to one-shot questions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_cooldown_minutes() -> u64 {
    DEFAULT_COOLDOWN_MINUTES
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            keys_env: Vec::new(),
            keys: Vec::new(),
            cooldown_minutes: DEFAULT_COOLDOWN_MINUTES,
            storage_dir: None,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            headers: HashMap::new(),
            system_prompt: None,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl Settings {
    /// Effective default cooldown after clamping
    pub fn cooldown(&self) -> Duration {
        clamp_cooldown_minutes(self.cooldown_minutes)
    }

    /// Collect the API keys in rotation order.
    ///
    /// Order: `keys_env`, raw `keys`, `KEYROTATE_API_KEYS`, then
    /// `KEYROTATE_API_KEY_1..` until the first missing number. Blank values
    /// are skipped and duplicates keep their first position.
    pub fn resolve_keys(&self, env: impl Fn(&str) -> Option<String>) -> Vec<KeyEntry> {
        let mut entries: Vec<KeyEntry> = Vec::new();
        let mut push = |identifier: String, secret: &str| {
            let secret = secret.trim();
            if secret.is_empty() || entries.iter().any(|e| e.secret == secret) {
                return;
            }
            entries.push(KeyEntry::new(identifier, secret));
        };

        for name in &self.keys_env {
            if let Some(value) = env(name) {
                push(name.clone(), &value);
            }
        }

        for (i, key) in self.keys.iter().enumerate() {
            push(format!("config[{}]", i), key);
        }

        if let Some(list) = env(KEYS_ENV) {
            for (i, key) in list.split(',').enumerate() {
                push(format!("{}[{}]", KEYS_ENV, i), key);
            }
        }

        for n in 1.. {
            let name = format!("{}{}", NUMBERED_KEY_ENV_PREFIX, n);
            match env(&name) {
                Some(value) => push(name, &value),
                None => break,
            }
        }

        entries
    }
}

impl ProviderConfig {
    /// Full URL of the chat completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Build the extra request headers
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (key, value) in &self.headers {
            let name = HeaderName::try_from(key.as_str())
                .map_err(|e| KeyrotError::Config(format!("Invalid header name '{}': {}", key, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| KeyrotError::Config(format!("Invalid value for header '{}': {}", key, e)))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }
}
