//! Text Generator Adapters.
//!
//! ## Available Adapters
//!
//! - `MockTextGenerator` - Configurable mock for testing
//! - `OpenAiTextGenerator` - OpenAI-compatible chat completions

mod mock_generator;
mod openai_generator;

pub use mock_generator::{MockResponse, MockTextGenerator, DEFAULT_MOCK_RESPONSE};
pub use openai_generator::{OpenAiConfig, OpenAiTextGenerator};
