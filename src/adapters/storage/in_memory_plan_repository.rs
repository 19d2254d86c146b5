//! In-memory Plan Repository Adapter
//!
//! Keeps plan records in a HashMap. For tests and the console binary.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::BotId;
use crate::domain::interview::PlanRecord;
use crate::ports::{PlanRepository, PlanStorageError};

/// In-memory storage for plan records
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlanRepository {
    plans: Arc<RwLock<HashMap<BotId, PlanRecord>>>,
}

impl InMemoryPlanRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub async fn plan_count(&self) -> usize {
        self.plans.read().await.len()
    }

    /// Remove every record
    pub async fn clear(&self) {
        self.plans.write().await.clear();
    }
}

#[async_trait]
impl PlanRepository for InMemoryPlanRepository {
    async fn load(&self, bot_id: BotId) -> Result<Option<PlanRecord>, PlanStorageError> {
        Ok(self.plans.read().await.get(&bot_id).cloned())
    }

    async fn save(&self, bot_id: BotId, record: &PlanRecord) -> Result<(), PlanStorageError> {
        self.plans.write().await.insert(bot_id, record.clone());
        Ok(())
    }

    async fn delete(&self, bot_id: BotId) -> Result<(), PlanStorageError> {
        self.plans.write().await.remove(&bot_id);
        Ok(())
    }
}
