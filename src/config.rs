//! Configuration management for milenai.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub ui: UiConfig,
    /// File this config was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// One of "groq", "openrouter", "openai_compatible".
    pub name: String,
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    /// Env var consulted when `api_key` is absent. Defaults per provider.
    pub api_key_env: Option<String>,
    pub fast_model: String,
    pub deep_model: String,
    pub request_timeout_secs: u64,
    /// Sent as `X-Title`.
    pub app_title: Option<String>,
    /// Sent as `HTTP-Referer`.
    pub referer: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: "openrouter".to_string(),
            api_base: None,
            api_key: None,
            api_key_env: None,
            fast_model: "deepseek/deepseek-chat".to_string(),
            deep_model: "deepseek/deepseek-r1:free".to_string(),
            request_timeout_secs: 60,
            app_title: Some("MilenAI".to_string()),
            referer: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed wait between two attempts, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Any of these (case-insensitive substring) routes a question to the deep model.
    #[serde(default = "default_deep_keywords")]
    pub deep_keywords: Vec<String>,
}

fn default_deep_keywords() -> Vec<String> {
    ["nclex", "exam", "priority intervention", "practice test"]
        .iter()
        .map(|k| k.to_string())
        .collect()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            deep_keywords: default_deep_keywords(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_name")]
    pub name: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_assistant_name() -> String {
    "MilenAI".to_string()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            name: default_assistant_name(),
            system_prompt: Some(
                "You are MilenAI, a clinical intelligence assistant for nurses. \
                 Answer questions about clinical practice, nursing and patient care \
                 clearly and concisely."
                    .to_string(),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Entries shown by `/trending` when no count is given.
    #[serde(default = "default_trending_limit")]
    pub trending_limit: usize,
}

fn default_trending_limit() -> usize {
    5
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            trending_limit: default_trending_limit(),
        }
    }
}

/// Hosted chat-completion services with known endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderPreset {
    Groq,
    OpenRouter,
    OpenAiCompatible,
}

impl ProviderPreset {
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        match name.to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openrouter" => Ok(Self::OpenRouter),
            "openai_compatible" | "openai" => Ok(Self::OpenAiCompatible),
            _ => Err(ConfigError::UnknownProvider(name.to_string())),
        }
    }

    pub fn default_api_base(&self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/v1",
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::OpenAiCompatible => "https://api.openai.com/v1",
        }
    }

    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
            Self::OpenAiCompatible => "LLM_API_KEY",
        }
    }
}

impl AppConfig {
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".milenai").join("config.toml"))
    }

    /// Load the user config file (or defaults) and apply `MILENAI_*` overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Missing file means defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_required(path)
    }

    /// Like `load_from`, but a missing file is an error.
    pub fn load_required(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(provider) = lookup("MILENAI_PROVIDER") {
            self.provider.name = provider;
        }
        if let Some(api_base) = lookup("MILENAI_API_BASE") {
            self.provider.api_base = Some(api_base);
        }
        if let Some(model) = lookup("MILENAI_FAST_MODEL") {
            self.provider.fast_model = model;
        }
        if let Some(model) = lookup("MILENAI_DEEP_MODEL") {
            self.provider.deep_model = model;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.preset()?;
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.provider.fast_model.trim().is_empty() || self.provider.deep_model.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "provider.fast_model and provider.deep_model must not be empty".to_string(),
            ));
        }
        if self.provider.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "provider.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn preset(&self) -> Result<ProviderPreset, ConfigError> {
        ProviderPreset::from_name(&self.provider.name)
    }

    pub fn api_base(&self) -> Result<String, ConfigError> {
        match &self.provider.api_base {
            Some(base) if !base.trim().is_empty() => Ok(base.clone()),
            _ => Ok(self.preset()?.default_api_base().to_string()),
        }
    }

    pub fn api_key_env(&self) -> Result<String, ConfigError> {
        match &self.provider.api_key_env {
            Some(env) if !env.is_empty() => Ok(env.clone()),
            _ => Ok(self.preset()?.default_api_key_env().to_string()),
        }
    }

    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.resolve_api_key(|key| std::env::var(key).ok())
    }

    /// Explicit `api_key` first, then the provider's env var.
    pub fn resolve_api_key(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<String, ConfigError> {
        if let Some(key) = &self.provider.api_key {
            if !key.trim().is_empty() {
                return Ok(key.clone());
            }
        }
        let env = self.api_key_env()?;
        match lookup(&env) {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey {
                env,
                path: self
                    .source
                    .clone()
                    .or_else(|| Self::config_path().ok())
                    .unwrap_or_else(|| PathBuf::from("~/.milenai/config.toml")),
            }),
        }
    }

    pub fn save_default() -> Result<PathBuf> {
        let config_path = Self::config_path()?;
        Self::save_default_to(&config_path)?;
        Ok(config_path)
    }

    pub fn save_default_to(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content =
            toml::to_string_pretty(&Self::default()).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
