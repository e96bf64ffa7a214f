//! Configuration loading and management.
//!
//! This module loads engine settings from the `.flowkit/` directory and
//! the `FLOWKIT_*` environment variables.

pub mod error;
pub mod loader;
pub mod models;

pub use error::{ConfigError, ConfigResult};
pub use loader::{apply_env_overrides, load_config, load_config_with_env};
pub use models::{AppConfig, EngineConfig};
