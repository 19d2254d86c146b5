//! Extension Intent Classifier Port.
//!
//! Labels a user reply to an extension offer or a consent question as
//! ACCEPT, REFUSE or NEUTRAL. Classification never fails: implementations
//! resolve every doubt, error and timeout to NEUTRAL so an ambiguous reply
//! can never extend a session the user wants to end.

use async_trait::async_trait;

use crate::domain::interview::{ExtensionIntent, IntentContext};

/// Port for classifying replies to yes/no offers.
#[async_trait]
pub trait ExtensionIntentClassifier: Send + Sync {
    /// Classifies `message` given what was asked.
    async fn classify(&self, message: &str, context: IntentContext) -> ExtensionIntent;
}
