//! Plan Repository Port - Interface for persisting interview plans.
//!
//! One record per bot: the base plan, the user overrides and a version that
//! is bumped every time the base is regenerated.

use async_trait::async_trait;

use crate::domain::foundation::BotId;
use crate::domain::interview::PlanRecord;

/// Errors that can occur during plan storage operations.
#[derive(Debug, thiserror::Error)]
pub enum PlanStorageError {
    #[error("Failed to serialize plan: {0}")]
    SerializationFailed(String),

    #[error("Failed to deserialize plan: {0}")]
    DeserializationFailed(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Port for loading and saving plan records.
#[async_trait]
pub trait PlanRepository: Send + Sync {
    /// Loads the record for a bot, `None` if none was saved yet.
    async fn load(&self, bot_id: BotId) -> Result<Option<PlanRecord>, PlanStorageError>;

    /// Saves (inserts or replaces) the record for a bot.
    async fn save(&self, bot_id: BotId, record: &PlanRecord) -> Result<(), PlanStorageError>;

    /// Deletes the record for a bot. Deleting a missing record is not an error.
    async fn delete(&self, bot_id: BotId) -> Result<(), PlanStorageError>;
}
