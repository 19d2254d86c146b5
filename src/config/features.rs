//! Feature flags configuration

use serde::Deserialize;

/// Feature flags for enabling/disabling functionality
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    /// Generate runtime knowledge with the text model (fallback cues otherwise)
    #[serde(default = "default_true")]
    pub enable_runtime_knowledge: bool,

    /// Enable tracing output
    #[serde(default = "default_true")]
    pub enable_tracing: bool,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            enable_runtime_knowledge: true,
            enable_tracing: true,
            json_logs: false,
        }
    }
}

fn default_true() -> bool {
    true
}
