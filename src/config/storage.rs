//! Plan storage configuration

use serde::Deserialize;
use std::path::PathBuf;

use super::error::ValidationError;

/// Where plan records live
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend for plan records
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for the file backend
    #[serde(default = "default_plan_dir")]
    pub plan_dir: PathBuf,
}

/// Plan storage backend
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
}

impl StorageConfig {
    /// Validate storage configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.backend == StorageBackend::File && self.plan_dir.as_os_str().is_empty() {
            return Err(ValidationError::MissingRequired("STORAGE__PLAN_DIR"));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            plan_dir: default_plan_dir(),
        }
    }
}

fn default_plan_dir() -> PathBuf {
    PathBuf::from("./data/plans")
}
