//! Text Generator Port - Interface for the language model collaborator.
//!
//! The interview core asks a model for two things only: runtime knowledge
//! cues and, optionally, extension intent labels. Both go through this port
//! so the domain never depends on a provider.
//!
//! # Design
//!
//! - One prompt in, one text out; structured output is requested with an
//!   optional JSON shape and parsed by the caller
//! - Every request carries its own deadline
//! - Callers never retry; an error means "use the fallback"

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Port for text generation.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a single completion for the prompt.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, GenerationError>;

    /// Get provider information (name, model).
    fn provider_info(&self) -> ProviderInfo;
}

/// Request for a single generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Full prompt text.
    pub prompt: String,
    /// JSON shape the answer must follow, if structured output is wanted.
    pub output_shape: Option<Value>,
    /// Temperature for response randomness.
    pub temperature: Option<f32>,
    /// Hard deadline for the call.
    pub timeout: Option<Duration>,
}

impl GenerationRequest {
    /// Creates a plain text request.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            output_shape: None,
            temperature: None,
            timeout: None,
        }
    }

    /// Requests JSON output following `shape`.
    pub fn with_output_shape(mut self, shape: Value) -> Self {
        self.output_shape = Some(shape);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// True if the caller expects JSON back.
    pub fn wants_json(&self) -> bool {
        self.output_shape.is_some()
    }
}

/// Response from a generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResponse {
    /// Raw text returned by the model.
    pub content: String,
    /// Model that answered.
    pub model: String,
}

impl GenerationResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
        }
    }

    /// Parses the content as JSON.
    ///
    /// Tolerates a surrounding markdown code fence, which some models add
    /// even when asked for raw JSON.
    pub fn json(&self) -> Result<Value, GenerationError> {
        let trimmed = self.content.trim();
        let body = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|rest| rest.trim_end().strip_suffix("```"))
            .unwrap_or(trimmed);
        serde_json::from_str(body.trim()).map_err(|e| GenerationError::parse(e.to_string()))
    }
}

/// Information about a text generation provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    /// Provider name (e.g., "openai", "mock").
    pub name: String,
    /// Model identifier.
    pub model: String,
    /// Whether the provider honours a JSON response format.
    pub supports_json_output: bool,
}

impl ProviderInfo {
    /// Creates new provider info.
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            supports_json_output: true,
        }
    }

    /// Sets JSON output support.
    pub fn with_json_output(mut self, supports: bool) -> Self {
        self.supports_json_output = supports;
        self
    }
}

/// Text generation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Request exceeded its deadline.
    #[error("generation timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured deadline.
        timeout_ms: u64,
    },

    /// Provider is unavailable.
    #[error("provider unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// Rate limited by provider.
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until retry is allowed.
        retry_after_secs: u32,
    },

    /// Network error during request.
    #[error("network error: {0}")]
    Network(String),

    /// Failed to parse provider response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid request configuration.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// API key or authentication failed.
    #[error("authentication failed")]
    AuthenticationFailed,
}

impl GenerationError {
    /// Creates a timeout error from the deadline that elapsed.
    pub fn timeout(deadline: Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a rate limited error.
    pub fn rate_limited(retry_after_secs: u32) -> Self {
        Self::RateLimited { retry_after_secs }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Returns true if a later attempt could succeed.
    ///
    /// Only reported in logs: the interview never retries a generation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited { .. }
                | GenerationError::Unavailable { .. }
                | GenerationError::Network(_)
                | GenerationError::Timeout { .. }
        )
    }

    /// True if the error is a deadline miss.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GenerationError::Timeout { .. })
    }
}
