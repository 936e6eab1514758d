//! Configuration file loading.
//!
//! A missing `--config` flag means defaults everywhere; a missing file that
//! was explicitly named is an error.

use std::path::Path;

use tracing::debug;

use super::schema::Config;
use crate::error::ConfigError;

/// Loads and validates a configuration file.
///
/// # Errors
///
/// Returns `ConfigError::MissingFile` if the file does not exist,
/// `ConfigError::ParseError` if it is not valid YAML for the schema, or a
/// validation error for zero magnitudes.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::MissingFile {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        }
    })?;

    let config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    config.validate()?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}
