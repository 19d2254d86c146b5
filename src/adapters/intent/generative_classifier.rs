//! Text-generation backed intent classifier.
//!
//! Asks the model for a single label under a hard deadline. Timeouts,
//! provider errors and unreadable labels all resolve to NEUTRAL.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::domain::interview::{ExtensionIntent, IntentContext, OfferKind};
use crate::ports::{ExtensionIntentClassifier, GenerationError, GenerationRequest, TextGenerator};

/// Default deadline for one classification.
pub const DEFAULT_CLASSIFICATION_TIMEOUT: Duration = Duration::from_millis(1500);

/// Intent classifier that delegates to a text generator.
pub struct GenerativeIntentClassifier {
    generator: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl GenerativeIntentClassifier {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            timeout: DEFAULT_CLASSIFICATION_TIMEOUT,
        }
    }

    /// Sets the deadline for one classification.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn prompt(message: &str, context: &IntentContext) -> String {
        let question = match context.kind {
            OfferKind::Extension => {
                "The interviewer offered to continue the interview for a few more minutes."
            }
            OfferKind::Consent => {
                "The interviewer asked for permission to keep the participant's contact details."
            }
        };
        let caveat = if context.was_offer {
            ""
        } else {
            " The previous assistant turn may not have been that exact question, so be conservative."
        };
        format!(
            "{question}{caveat}\n\
             Classify the participant's reply (language: {language}).\n\
             ACCEPT: a clear yes. REFUSE: a clear no or a wish to stop. \
             NEUTRAL: anything else, including questions or unrelated answers.\n\
             Reply: \"{message}\"",
            language = context.language.code(),
        )
    }

    fn output_shape() -> Value {
        json!({
            "type": "object",
            "properties": {
                "label": { "type": "string", "enum": ["ACCEPT", "REFUSE", "NEUTRAL"] }
            },
            "required": ["label"]
        })
    }

    async fn request_label(&self, message: &str, context: &IntentContext) -> Result<ExtensionIntent, GenerationError> {
        let request = GenerationRequest::new(Self::prompt(message, context))
            .with_output_shape(Self::output_shape())
            .with_temperature(0.0)
            .with_timeout(self.timeout);

        let response = timeout(self.timeout, self.generator.generate(request))
            .await
            .map_err(|_| GenerationError::timeout(self.timeout))??;

        let intent = match response.json() {
            Ok(value) => value
                .get("label")
                .and_then(Value::as_str)
                .map(ExtensionIntent::from_label)
                .unwrap_or_default(),
            Err(_) => ExtensionIntent::from_label(&response.content),
        };
        Ok(intent)
    }
}

#[async_trait]
impl ExtensionIntentClassifier for GenerativeIntentClassifier {
    async fn classify(&self, message: &str, context: IntentContext) -> ExtensionIntent {
        if message.trim().is_empty() {
            return ExtensionIntent::Neutral;
        }
        match self.request_label(message, &context).await {
            Ok(intent) => {
                tracing::debug!(kind = ?context.kind, %intent, "classified reply with text model");
                intent
            }
            Err(err) => {
                tracing::warn!(
                    kind = ?context.kind,
                    error = %err,
                    retryable = err.is_retryable(),
                    "intent classification failed, treating reply as neutral"
                );
                ExtensionIntent::Neutral
            }
        }
    }
}
