//! File-based Plan Repository Adapter
//!
//! Stores one YAML document per bot under the base directory, named after
//! the bot id. Readable by hand, which is handy when tuning overrides.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::foundation::BotId;
use crate::domain::interview::PlanRecord;
use crate::ports::{PlanRepository, PlanStorageError};

/// File-based storage for plan records
#[derive(Debug, Clone)]
pub struct FilePlanRepository {
    base_path: PathBuf,
}

impl FilePlanRepository {
    /// Create a new file repository rooted at `base_path`
    ///
    /// # Example
    /// ```ignore
    /// let plans = FilePlanRepository::new("./data/plans");
    /// ```
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    fn plan_file_path(&self, bot_id: BotId) -> PathBuf {
        self.base_path.join(format!("{bot_id}.yaml"))
    }
}

#[async_trait]
impl PlanRepository for FilePlanRepository {
    async fn load(&self, bot_id: BotId) -> Result<Option<PlanRecord>, PlanStorageError> {
        let file_path = self.plan_file_path(bot_id);
        if !file_path.exists() {
            return Ok(None);
        }

        let yaml = fs::read_to_string(&file_path)
            .await
            .map_err(|e| PlanStorageError::IoError(e.to_string()))?;

        let record = serde_yaml::from_str(&yaml)
            .map_err(|e| PlanStorageError::DeserializationFailed(e.to_string()))?;

        Ok(Some(record))
    }

    async fn save(&self, bot_id: BotId, record: &PlanRecord) -> Result<(), PlanStorageError> {
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| PlanStorageError::IoError(e.to_string()))?;

        let yaml = serde_yaml::to_string(record)
            .map_err(|e| PlanStorageError::SerializationFailed(e.to_string()))?;

        // Write-then-rename keeps a concurrent reader from seeing half a file.
        let tmp_path = self.plan_file_path(bot_id).with_extension("yaml.tmp");
        fs::write(&tmp_path, yaml)
            .await
            .map_err(|e| PlanStorageError::IoError(e.to_string()))?;
        fs::rename(&tmp_path, self.plan_file_path(bot_id))
            .await
            .map_err(|e| PlanStorageError::IoError(e.to_string()))?;

        tracing::debug!(%bot_id, version = record.version, "saved plan record");
        Ok(())
    }

    async fn delete(&self, bot_id: BotId) -> Result<(), PlanStorageError> {
        let file_path = self.plan_file_path(bot_id);
        if file_path.exists() {
            fs::remove_file(&file_path)
                .await
                .map_err(|e| PlanStorageError::IoError(e.to_string()))?;
        }
        Ok(())
    }
}
