//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `INTERVIEW_CONDUCTOR`
//! prefix and `__` between nested keys. Every section has defaults, so an
//! empty environment yields a working offline setup (mock generator,
//! in-memory plans).
//!
//! # Example
//!
//! ```no_run
//! use interview_conductor::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod ai;
mod error;
mod features;
mod interview;
mod storage;

pub use ai::{AiConfig, AiProvider, MAX_KNOWLEDGE_TIMEOUT_MS, MIN_KNOWLEDGE_TIMEOUT_MS};
pub use error::{ConfigError, ValidationError};
pub use features::FeatureFlags;
pub use interview::InterviewConfig;
pub use storage::{StorageBackend, StorageConfig};

use serde::Deserialize;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "INTERVIEW_CONDUCTOR";

/// Root application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Text generation (provider, model, deadlines)
    #[serde(default)]
    pub ai: AiConfig,

    /// Interview pacing and policy
    #[serde(default)]
    pub interview: InterviewConfig,

    /// Plan storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Feature flags
    #[serde(default)]
    pub features: FeatureFlags,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `INTERVIEW_CONDUCTOR` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `INTERVIEW_CONDUCTOR__AI__PROVIDER=openai` -> `ai.provider = openai`
    /// - `INTERVIEW_CONDUCTOR__INTERVIEW__SECONDS_PER_TURN=40` -> `interview.seconds_per_turn = 40`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix(ENV_PREFIX)
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.ai.validate()?;
        self.interview.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}
