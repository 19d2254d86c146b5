//! Intent Classifier Adapters.
//!
//! - `KeywordIntentClassifier` - Multilingual accept/refuse lexicons, no model
//! - `GenerativeIntentClassifier` - Text model label with a hard deadline

mod generative_classifier;
mod keyword_classifier;

pub use generative_classifier::{GenerativeIntentClassifier, DEFAULT_CLASSIFICATION_TIMEOUT};
pub use keyword_classifier::{classify_by_keywords, KeywordIntentClassifier};
