//! Configuration file loader for the `.flowkit/` directory.
//!
//! Settings come from `.flowkit/config.toml`, then environment overrides:
//! - `FLOWKIT_MERGE_STRATEGY`: `shallow` or `deep`
//! - `FLOWKIT_TIMEOUT_MS`: default run timeout in milliseconds

use crate::config::error::{ConfigError, ConfigResult};
use crate::config::models::AppConfig;
use std::path::Path;
use tracing::debug;

pub const CONFIG_DIR: &str = ".flowkit";
pub const CONFIG_FILE: &str = "config.toml";
pub const ENV_MERGE_STRATEGY: &str = "FLOWKIT_MERGE_STRATEGY";
pub const ENV_TIMEOUT_MS: &str = "FLOWKIT_TIMEOUT_MS";

/// Loads configuration from `<root>/.flowkit/config.toml`.
///
/// # Arguments
///
/// * `root` - Root directory containing the `.flowkit/` folder
///
/// # Returns
///
/// The parsed `AppConfig`. A missing directory or file yields the default
/// configuration rather than an error. Environment overrides are not
/// applied; see [`load_config_with_env`].
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or is not
/// valid TOML.
pub async fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let config_path = root.join(CONFIG_DIR).join(CONFIG_FILE);

    if !config_path.exists() {
        debug!(path = %config_path.display(), "no config file, using defaults");
        return Ok(AppConfig::default());
    }

    let content = tokio::fs::read_to_string(&config_path)
        .await
        .map_err(|source| ConfigError::FileRead {
            path: config_path.clone(),
            source,
        })?;

    let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
        path: config_path.clone(),
        source,
    })?;

    debug!(path = %config_path.display(), ?config, "loaded config");
    Ok(config)
}

/// Loads configuration and applies overrides from the process environment.
pub async fn load_config_with_env(root: &Path) -> ConfigResult<AppConfig> {
    let config = load_config(root).await?;
    apply_env_overrides(config, |name| std::env::var(name).ok())
}

/// Applies environment overrides using `lookup` to read variables.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnv` if a set variable cannot be parsed.
pub fn apply_env_overrides<F>(mut config: AppConfig, lookup: F) -> ConfigResult<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_MERGE_STRATEGY) {
        config.engine.merge_strategy =
            value.parse().map_err(|reason| ConfigError::InvalidEnv {
                name: ENV_MERGE_STRATEGY,
                value: value.clone(),
                reason,
            })?;
    }

    if let Some(value) = lookup(ENV_TIMEOUT_MS) {
        let timeout = value
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnv {
                name: ENV_TIMEOUT_MS,
                value: value.clone(),
                reason: e.to_string(),
            })?;
        config.engine.default_timeout_ms = Some(timeout);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MergeStrategy;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(root: &Path, content: &str) {
        let dir = root.join(CONFIG_DIR);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CONFIG_FILE), content).unwrap();
    }

    #[tokio::test]
    async fn test_missing_directory_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = load_config(temp.path()).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.engine.validate_result);
    }

    #[tokio::test]
    async fn test_load_engine_section() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            r#"
[engine]
merge-strategy = "deep"
default-timeout-ms = 1500
"#,
        );

        let config = load_config(temp.path()).await.unwrap();
        assert_eq!(config.engine.merge_strategy, MergeStrategy::Deep);
        assert_eq!(config.engine.default_timeout_ms, Some(1500));
        assert!(config.engine.validate_result);
    }

    #[tokio::test]
    async fn test_invalid_toml_is_reported() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "[engine\nmerge-strategy = ");

        let err = load_config(temp.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse { .. }));
    }

    #[tokio::test]
    async fn test_unknown_strategy_in_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), "[engine]\nmerge-strategy = \"weird\"\n");

        let err = load_config(temp.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::TomlParse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let config = apply_env_overrides(AppConfig::default(), |name| match name {
            ENV_MERGE_STRATEGY => Some("deep".to_string()),
            ENV_TIMEOUT_MS => Some("250".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.engine.merge_strategy, MergeStrategy::Deep);
        assert_eq!(config.engine.default_timeout_ms, Some(250));
    }

    #[test]
    fn test_invalid_env_override() {
        let err = apply_env_overrides(AppConfig::default(), |name| {
            (name == ENV_TIMEOUT_MS).then(|| "soon".to_string())
        })
        .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::InvalidEnv { name: ENV_TIMEOUT_MS, .. }
        ));
    }
}
