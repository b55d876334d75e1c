// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Switchboard
//!
//! Handles loading settings from a TOML file or assembling them from
//! environment variables. API keys can be stored directly (not recommended)
//! or referenced via an environment variable name.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GatewayError, Result};

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Who may talk to the gateway
    #[serde(default)]
    pub access: AccessConfig,

    /// Provider credential configuration
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Default settings for new sessions
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Conversation and token management settings
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Timeout and retry settings for provider calls
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

/// Access control configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AccessConfig {
    /// User identifiers permitted to use the gateway
    #[serde(default)]
    pub allowed_user_ids: Vec<String>,

    /// The operator's user identifier (implicitly allowed)
    #[serde(default)]
    pub admin_id: String,
}

/// Configuration for provider backends
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    /// OpenRouter configuration (OpenAI/Anthropic/Perplexity models via one API)
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Google Gemini configuration (direct API)
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Fal configuration (image generation)
    #[serde(default)]
    pub fal: FalConfig,
}

/// OpenRouter-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_openrouter_api_key_env")]
    pub api_key_env: String,

    /// Base URL for API (for custom endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_openrouter_api_key_env(),
            base_url: None,
        }
    }
}

/// Gemini-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_gemini_api_key_env")]
    pub api_key_env: String,

    /// Base URL for API (for custom endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_gemini_api_key_env(),
            base_url: None,
        }
    }
}

/// Fal-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FalConfig {
    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for API key
    #[serde(default = "default_fal_api_key_env")]
    pub api_key_env: String,

    /// Base URL for API (for custom endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for FalConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_env: default_fal_api_key_env(),
            base_url: None,
        }
    }
}

/// Default settings for new sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Model selected for users who have not switched
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens for a response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Conversation and token management configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Estimated characters per token for history budget calculations
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: u32,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            chars_per_token: default_chars_per_token(),
        }
    }
}

/// Timeout and retry settings for provider calls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Hard deadline for a single provider call, in seconds
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Ceiling on the provider-requested rate-limit delay, in seconds
    #[serde(default = "default_retry_after_ceiling_secs")]
    pub retry_after_ceiling_secs: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: default_provider_timeout_secs(),
            retry_after_ceiling_secs: default_retry_after_ceiling_secs(),
        }
    }
}

fn default_openrouter_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_gemini_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_fal_api_key_env() -> String {
    "FAL_API_KEY".to_string()
}

fn default_model() -> String {
    "openai/gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_chars_per_token() -> u32 {
    4
}

fn default_provider_timeout_secs() -> u64 {
    60
}

fn default_retry_after_ceiling_secs() -> u64 {
    30
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Assemble settings from environment variables
    ///
    /// `SWITCHBOARD_ALLOWED_USER_IDS` is a comma-separated list;
    /// `SWITCHBOARD_ADMIN_ID` names the operator. API keys come from their
    /// provider env vars. Unset values fall back to serde defaults.
    pub fn from_env() -> Result<Self> {
        let mut settings = Settings::default();

        if let Ok(ids) = std::env::var("SWITCHBOARD_ALLOWED_USER_IDS") {
            settings.access.allowed_user_ids = ids
                .split(',')
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect();
        }
        if let Ok(admin) = std::env::var("SWITCHBOARD_ADMIN_ID") {
            settings.access.admin_id = admin.trim().to_string();
        }
        if let Ok(model) = std::env::var("SWITCHBOARD_DEFAULT_MODEL") {
            settings.defaults.model = model;
        }
        if let Ok(max_tokens) = std::env::var("SWITCHBOARD_MAX_TOKENS") {
            settings.defaults.max_tokens = max_tokens.parse().map_err(|_| {
                GatewayError::Config(format!("SWITCHBOARD_MAX_TOKENS is not a number: {}", max_tokens))
            })?;
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Validate invariants that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        if self.access.admin_id.trim().is_empty() {
            return Err(GatewayError::Config("admin_id must not be empty".to_string()));
        }
        if self.defaults.model.trim().is_empty() {
            return Err(GatewayError::Config("default model must not be empty".to_string()));
        }
        if self.defaults.max_tokens == 0 {
            return Err(GatewayError::Config("max_tokens must be greater than zero".to_string()));
        }
        if self.conversation.chars_per_token == 0 {
            return Err(GatewayError::Config(
                "chars_per_token must be greater than zero".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.defaults.temperature) {
            return Err(GatewayError::Config(
                "temperature must be in the inclusive range 0.0..=2.0".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the OpenRouter API key from settings or environment
    pub fn get_openrouter_api_key(&self) -> Option<String> {
        self.providers
            .openrouter
            .api_key
            .clone()
            .or_else(|| std::env::var(&self.providers.openrouter.api_key_env).ok())
            .filter(|key| !key.is_empty())
    }

    /// Get the Gemini API key from settings or environment
    pub fn get_gemini_api_key(&self) -> Option<String> {
        self.providers
            .gemini
            .api_key
            .clone()
            .or_else(|| std::env::var(&self.providers.gemini.api_key_env).ok())
            .filter(|key| !key.is_empty())
    }

    /// Get the Fal API key from settings or environment
    pub fn get_fal_api_key(&self) -> Option<String> {
        self.providers
            .fal
            .api_key
            .clone()
            .or_else(|| std::env::var(&self.providers.fal.api_key_env).ok())
            .filter(|key| !key.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        let mut settings = Settings::default();
        settings.access.admin_id = "1".to_string();
        settings
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.defaults.model, "openai/gpt-4o-mini");
        assert_eq!(settings.defaults.max_tokens, 4096);
        assert!((settings.defaults.temperature - 0.7).abs() < 0.001);
        assert_eq!(settings.conversation.chars_per_token, 4);
        assert_eq!(settings.resilience.provider_timeout_secs, 60);
        assert_eq!(settings.resilience.retry_after_ceiling_secs, 30);
        assert!(settings.access.allowed_user_ids.is_empty());
    }

    #[test]
    fn test_validate_empty_admin() {
        let settings = Settings::default();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_zero_max_tokens() {
        let mut settings = valid_settings();
        settings.defaults.max_tokens = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_zero_chars_per_token() {
        let mut settings = valid_settings();
        settings.conversation.chars_per_token = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_temperature_out_of_range() {
        let mut settings = valid_settings();
        settings.defaults.temperature = 2.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_ok() {
        assert!(valid_settings().validate().is_ok());
    }

    #[test]
    fn test_api_key_direct_value_wins() {
        let mut settings = valid_settings();
        settings.providers.openrouter.api_key = Some("sk-direct".to_string());
        assert_eq!(settings.get_openrouter_api_key().as_deref(), Some("sk-direct"));
    }

    #[test]
    fn test_api_key_missing() {
        let mut settings = valid_settings();
        settings.providers.fal.api_key = None;
        settings.providers.fal.api_key_env = "NONEXISTENT_ENV_VAR_12345".to_string();
        assert!(settings.get_fal_api_key().is_none());
    }

    #[test]
    fn test_api_key_empty_string_is_none() {
        let mut settings = valid_settings();
        settings.providers.gemini.api_key = Some(String::new());
        settings.providers.gemini.api_key_env = "NONEXISTENT_ENV_VAR_12345".to_string();
        assert!(settings.get_gemini_api_key().is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        let mut settings = valid_settings();
        settings.access.allowed_user_ids = vec!["1".to_string(), "2".to_string()];
        settings.defaults.model = "gemini-2.0-flash".to_string();

        let serialized = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&serialized).unwrap();

        assert_eq!(parsed.access.allowed_user_ids, settings.access.allowed_user_ids);
        assert_eq!(parsed.defaults.model, "gemini-2.0-flash");
        assert_eq!(parsed.defaults.max_tokens, settings.defaults.max_tokens);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: Settings = toml::from_str(
            r#"
            [access]
            admin_id = "99"
            allowed_user_ids = ["7"]
            "#,
        )
        .unwrap();

        assert_eq!(parsed.access.admin_id, "99");
        assert_eq!(parsed.defaults.max_tokens, 4096);
        assert_eq!(parsed.providers.openrouter.api_key_env, "OPENROUTER_API_KEY");
    }
}
