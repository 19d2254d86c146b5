//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `TextGenerator` - Language model used for knowledge cues and intent labels
//! - `ExtensionIntentClassifier` - ACCEPT / REFUSE / NEUTRAL for offer replies
//! - `PlanRepository` - Plan records keyed by bot

mod intent_classifier;
mod plan_repository;
mod text_generator;

pub use intent_classifier::ExtensionIntentClassifier;
pub use plan_repository::{PlanRepository, PlanStorageError};
pub use text_generator::{
    GenerationError, GenerationRequest, GenerationResponse, ProviderInfo, TextGenerator,
};
