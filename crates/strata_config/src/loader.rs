//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::path::Path;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "strata.toml";

/// Loads and validates a `strata.toml` configuration from a project directory.
///
/// Reads `<project_dir>/strata.toml`, parses it, and validates it.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE);
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `strata.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that paths are present and the cache cannot clobber the project.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    let dir = config.cache.dir.trim();
    if dir.is_empty() {
        return Err(ConfigError::ValidationError(
            "cache.dir must not be empty".to_string(),
        ));
    }
    if matches!(dir, "." | "./") {
        return Err(ConfigError::ValidationError(
            "cache.dir must not be the project root".to_string(),
        ));
    }
    if config.cache.index.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "cache.index must not be empty".to_string(),
        ));
    }
    for (i, resource) in config.resources.iter().enumerate() {
        if resource.base.trim().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "resources[{i}].base must not be empty"
            )));
        }
    }
    Ok(())
}
