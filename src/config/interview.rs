//! Interview pacing configuration

use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::interview::{
    EngineConfig, DEFAULT_DEEPEN_TURNS_PER_TOPIC, DEFAULT_SECONDS_PER_TURN,
    MAX_BONUS_TURNS_PER_TOPIC, MAX_DEEPEN_TURNS_PER_TOPIC, MAX_OFFER_ATTEMPTS,
};

use super::error::ValidationError;

/// Interview pacing and policy
#[derive(Debug, Clone, Deserialize)]
pub struct InterviewConfig {
    /// Seconds one question/answer exchange is assumed to take
    #[serde(default = "default_seconds_per_turn")]
    pub seconds_per_turn: u32,

    /// Bonus turns any single topic may receive during EXPLORE
    #[serde(default = "default_max_bonus_turns")]
    pub max_bonus_turns: u32,

    /// DEEPEN allowance per topic before overrides
    #[serde(default = "default_deepen_turns")]
    pub deepen_turns_per_topic: u32,

    /// Unclassifiable replies tolerated before an offer counts as refused
    #[serde(default = "default_max_offer_attempts")]
    pub max_extension_offers: u32,

    /// Session length when the bot does not set one
    #[serde(default = "default_duration_minutes")]
    pub default_duration_minutes: u32,

    /// Ask for contact details at the end of the interview
    #[serde(default)]
    pub collect_data: bool,

    /// Signal score at which a reply becomes the topic's key insight
    #[serde(default = "default_insight_threshold")]
    pub insight_threshold: f64,

    /// What the interview is trying to learn (feeds knowledge generation)
    #[serde(default)]
    pub goal: String,

    /// Who is being interviewed
    #[serde(default)]
    pub audience: String,

    /// Optional markdown guide with hand-written cues
    pub guide_path: Option<PathBuf>,
}

impl InterviewConfig {
    /// Engine knobs derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_bonus_turns: self.max_bonus_turns,
            max_offer_attempts: self.max_extension_offers,
            insight_threshold: self.insight_threshold,
        }
    }

    /// Validate interview configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.seconds_per_turn == 0 {
            return Err(ValidationError::TooSmall {
                field: "interview.seconds_per_turn",
                min: 1,
            });
        }
        if self.default_duration_minutes == 0 {
            return Err(ValidationError::TooSmall {
                field: "interview.default_duration_minutes",
                min: 1,
            });
        }
        if self.max_extension_offers == 0 {
            return Err(ValidationError::TooSmall {
                field: "interview.max_extension_offers",
                min: 1,
            });
        }
        if self.max_extension_offers > MAX_OFFER_ATTEMPTS {
            return Err(ValidationError::TooLarge {
                field: "interview.max_extension_offers",
                max: u64::from(MAX_OFFER_ATTEMPTS),
            });
        }
        if self.max_bonus_turns > MAX_BONUS_TURNS_PER_TOPIC {
            return Err(ValidationError::TooLarge {
                field: "interview.max_bonus_turns",
                max: u64::from(MAX_BONUS_TURNS_PER_TOPIC),
            });
        }
        if self.deepen_turns_per_topic == 0 {
            return Err(ValidationError::TooSmall {
                field: "interview.deepen_turns_per_topic",
                min: 1,
            });
        }
        if self.deepen_turns_per_topic > MAX_DEEPEN_TURNS_PER_TOPIC {
            return Err(ValidationError::TooLarge {
                field: "interview.deepen_turns_per_topic",
                max: u64::from(MAX_DEEPEN_TURNS_PER_TOPIC),
            });
        }
        if !(0.0..=1.0).contains(&self.insight_threshold) {
            return Err(ValidationError::InvalidInsightThreshold);
        }
        Ok(())
    }
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            seconds_per_turn: default_seconds_per_turn(),
            max_bonus_turns: default_max_bonus_turns(),
            deepen_turns_per_topic: default_deepen_turns(),
            max_extension_offers: default_max_offer_attempts(),
            default_duration_minutes: default_duration_minutes(),
            collect_data: false,
            insight_threshold: default_insight_threshold(),
            goal: String::new(),
            audience: String::new(),
            guide_path: None,
        }
    }
}

fn default_seconds_per_turn() -> u32 {
    DEFAULT_SECONDS_PER_TURN
}

fn default_max_bonus_turns() -> u32 {
    EngineConfig::default().max_bonus_turns
}

fn default_deepen_turns() -> u32 {
    DEFAULT_DEEPEN_TURNS_PER_TOPIC
}

fn default_max_offer_attempts() -> u32 {
    EngineConfig::default().max_offer_attempts
}

fn default_duration_minutes() -> u32 {
    10
}

fn default_insight_threshold() -> f64 {
    EngineConfig::default().insight_threshold
}
