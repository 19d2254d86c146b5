//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `ai` - Text generators (mock, OpenAI-compatible)
//! - `intent` - Extension/consent intent classifiers
//! - `storage` - Plan repositories (in-memory, YAML files)

pub mod ai;
pub mod intent;
pub mod storage;

pub use ai::{MockTextGenerator, OpenAiConfig, OpenAiTextGenerator};
pub use intent::{GenerativeIntentClassifier, KeywordIntentClassifier};
pub use storage::{FilePlanRepository, InMemoryPlanRepository};
