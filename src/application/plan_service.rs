//! PlanService - load-or-create, regenerate and override interview plans.
//!
//! Wraps a `PlanRepository`. A stored record is only rewritten when its base
//! plan was created or regenerated, or when the configured DEEPEN allowance
//! changed; an unchanged topic list and duration never touches storage.

use serde_json::Value;
use std::sync::Arc;

use crate::domain::foundation::BotId;
use crate::domain::interview::{
    PlanOverrides, PlanRecord, PlanRefresh, Topic, DEFAULT_DEEPEN_TURNS_PER_TOPIC,
    DEFAULT_SECONDS_PER_TURN, MAX_DEEPEN_TURNS_PER_TOPIC,
};
use crate::ports::{PlanRepository, PlanStorageError};

/// Plan lifecycle on top of a repository.
pub struct PlanService {
    repository: Arc<dyn PlanRepository>,
    seconds_per_turn: u32,
    deepen_turns_per_topic: u32,
}

impl PlanService {
    pub fn new(repository: Arc<dyn PlanRepository>) -> Self {
        Self {
            repository,
            seconds_per_turn: DEFAULT_SECONDS_PER_TURN,
            deepen_turns_per_topic: DEFAULT_DEEPEN_TURNS_PER_TOPIC,
        }
    }

    pub fn with_seconds_per_turn(mut self, seconds: u32) -> Self {
        self.seconds_per_turn = seconds.max(1);
        self
    }

    /// DEEPEN allowance written into base plans (overrides still win).
    pub fn with_deepen_turns_per_topic(mut self, turns: u32) -> Self {
        self.deepen_turns_per_topic = turns.clamp(1, MAX_DEEPEN_TURNS_PER_TOPIC);
        self
    }

    /// Loads the record for `bot_id`, creating or regenerating it as needed.
    ///
    /// # Errors
    ///
    /// Returns `PlanStorageError` if the repository fails.
    pub async fn load_or_refresh(
        &self,
        bot_id: BotId,
        topics: &[Topic],
        duration_minutes: u32,
    ) -> Result<(PlanRecord, PlanRefresh), PlanStorageError> {
        let stored = self.repository.load(bot_id).await?;
        let (mut record, refresh) =
            PlanRecord::refresh(stored, topics, duration_minutes, self.seconds_per_turn);

        let allowance_changed = record.base.deepen.max_turns_per_topic != self.deepen_turns_per_topic;
        if allowance_changed {
            record.base.deepen.max_turns_per_topic = self.deepen_turns_per_topic;
        }

        if refresh != PlanRefresh::Unchanged || allowance_changed {
            self.repository.save(bot_id, &record).await?;
            tracing::debug!(%bot_id, ?refresh, version = record.version, "plan record stored");
        }
        Ok((record, refresh))
    }

    /// Replaces the overrides of a bot's plan. Invalid entries are dropped.
    ///
    /// # Errors
    ///
    /// Returns `PlanStorageError` if the repository fails.
    pub async fn update_overrides(
        &self,
        bot_id: BotId,
        topics: &[Topic],
        duration_minutes: u32,
        overrides: &PlanOverrides,
    ) -> Result<PlanRecord, PlanStorageError> {
        let (mut record, _) = self.load_or_refresh(bot_id, topics, duration_minutes).await?;
        record.set_overrides(overrides);
        self.repository.save(bot_id, &record).await?;
        tracing::info!(
            %bot_id,
            topic_overrides = record.overrides.topics.len(),
            "plan overrides updated"
        );
        Ok(record)
    }

    /// Same as [`update_overrides`](Self::update_overrides) for an untyped document.
    pub async fn update_overrides_json(
        &self,
        bot_id: BotId,
        topics: &[Topic],
        duration_minutes: u32,
        overrides: &Value,
    ) -> Result<PlanRecord, PlanStorageError> {
        self.update_overrides(bot_id, topics, duration_minutes, &PlanOverrides::from_json(overrides))
            .await
    }
}
