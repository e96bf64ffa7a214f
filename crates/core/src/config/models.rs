//! Configuration models.
//!
//! `AppConfig` mirrors the layout of `.flowkit/config.toml`:
//!
//! ```toml
//! [engine]
//! merge-strategy = "deep"
//! default-timeout-ms = 30000
//! validate-result = true
//! ```

use crate::engine::MergeStrategy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unified application configuration loaded from `.flowkit/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AppConfig {
    pub engine: EngineConfig,
}

/// Settings consumed by the workflow engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EngineConfig {
    /// How step outputs fold into the accumulated data.
    pub merge_strategy: MergeStrategy,

    /// Applied to runs that do not set their own timeout.
    pub default_timeout_ms: Option<u64>,

    /// Check the accumulated data against the result schema after the last step.
    pub validate_result: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            merge_strategy: MergeStrategy::Shallow,
            default_timeout_ms: None,
            validate_result: true,
        }
    }
}

impl EngineConfig {
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_ms.map(Duration::from_millis)
    }
}
