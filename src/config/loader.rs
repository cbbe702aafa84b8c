//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, RoutesConfig};
use crate::config::validation::{validate_routes, validate_settings, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn read(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Load and validate runtime settings from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(&read(path)?)?;
    validate_settings(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse a route table document without validating it.
pub fn parse_routes(json: &str) -> Result<RoutesConfig, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

/// Load a JSON route table and validate it against `config`.
pub fn load_routes(path: &Path, config: &GatewayConfig) -> Result<RoutesConfig, ConfigError> {
    let routes = parse_routes(&read(path)?)?;
    validate_routes(&routes, config).map_err(ConfigError::Validation)?;
    Ok(routes)
}
