//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers and error types
//! that form the vocabulary of the interview domain.

mod errors;
mod ids;
mod language;
mod timestamp;

pub use errors::ValidationError;
pub use ids::{BotId, SessionId, TopicId};
pub use language::Language;
pub use timestamp::Timestamp;
