//! Text generation configuration

use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Shortest deadline accepted for knowledge generation.
pub const MIN_KNOWLEDGE_TIMEOUT_MS: u64 = 600;
/// Longest deadline accepted for knowledge generation.
pub const MAX_KNOWLEDGE_TIMEOUT_MS: u64 = 2400;

/// Text generation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Which generator backs knowledge and intent classification
    #[serde(default)]
    pub provider: AiProvider,

    /// API key for the OpenAI-compatible provider
    pub api_key: Option<Secret<String>>,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Override for the API base URL (gateways, local servers)
    pub base_url: Option<String>,

    /// Deadline for one knowledge generation, clamped to 600..=2400 ms
    #[serde(default = "default_knowledge_timeout_ms")]
    pub knowledge_timeout_ms: u64,

    /// Deadline for one intent classification
    #[serde(default = "default_intent_timeout_ms")]
    pub intent_timeout_ms: u64,

    /// Sampling temperature for knowledge generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Classify offer replies with the model instead of keyword lexicons
    #[serde(default)]
    pub classify_intent_with_model: bool,
}

/// Text generation provider
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    /// No model: fallback cues and keyword classification only
    #[default]
    Mock,
    OpenAI,
}

impl AiConfig {
    /// Knowledge generation deadline, clamped to the accepted window.
    pub fn knowledge_timeout(&self) -> Duration {
        Duration::from_millis(
            self.knowledge_timeout_ms
                .clamp(MIN_KNOWLEDGE_TIMEOUT_MS, MAX_KNOWLEDGE_TIMEOUT_MS),
        )
    }

    pub fn intent_timeout(&self) -> Duration {
        Duration::from_millis(self.intent_timeout_ms)
    }

    /// Check if an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
    }

    /// Validate text generation configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.provider == AiProvider::OpenAI && !self.has_api_key() {
            return Err(ValidationError::MissingRequired("AI__API_KEY"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ValidationError::InvalidTemperature);
        }
        if let Some(url) = &self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ValidationError::InvalidBaseUrl(url.clone()));
            }
        }
        if self.intent_timeout_ms == 0 {
            return Err(ValidationError::TooSmall {
                field: "ai.intent_timeout_ms",
                min: 1,
            });
        }
        Ok(())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: AiProvider::default(),
            api_key: None,
            model: default_model(),
            base_url: None,
            knowledge_timeout_ms: default_knowledge_timeout_ms(),
            intent_timeout_ms: default_intent_timeout_ms(),
            temperature: default_temperature(),
            classify_intent_with_model: false,
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_knowledge_timeout_ms() -> u64 {
    1800
}

fn default_intent_timeout_ms() -> u64 {
    1500
}

fn default_temperature() -> f32 {
    0.2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_config_defaults() {
        let config = AiConfig::default();
        assert_eq!(config.provider, AiProvider::Mock);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.knowledge_timeout(), Duration::from_millis(1800));
        assert!(!config.classify_intent_with_model);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_knowledge_timeout_is_clamped() {
        let low = AiConfig {
            knowledge_timeout_ms: 50,
            ..Default::default()
        };
        let high = AiConfig {
            knowledge_timeout_ms: 10_000,
            ..Default::default()
        };
        assert_eq!(low.knowledge_timeout(), Duration::from_millis(600));
        assert_eq!(high.knowledge_timeout(), Duration::from_millis(2400));
    }

    #[test]
    fn test_openai_requires_api_key() {
        let config = AiConfig {
            provider: AiProvider::OpenAI,
            api_key: Some(Secret::new("  ".to_string())),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("AI__API_KEY"))
        );
    }

    #[test]
    fn test_openai_with_key_is_valid() {
        let config = AiConfig {
            provider: AiProvider::OpenAI,
            api_key: Some(Secret::new("sk-test".to_string())),
            base_url: Some("https://gateway.example.com/v1".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_temperature_and_url() {
        let hot = AiConfig {
            temperature: 3.5,
            ..Default::default()
        };
        assert_eq!(hot.validate(), Err(ValidationError::InvalidTemperature));

        let bad_url = AiConfig {
            base_url: Some("gateway.local".to_string()),
            ..Default::default()
        };
        assert!(matches!(bad_url.validate(), Err(ValidationError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_provider_deserializes_lowercase() {
        let provider: AiProvider = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(provider, AiProvider::OpenAI);
    }
}
