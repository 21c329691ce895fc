//! Configuration loading from disk.

use std::fs;
use std::path::Path;
use serde::Deserialize;
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};
use crate::route::RouteWrite;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    let config: GatewayConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Declared routes file layout.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RoutesFile {
    routes: Vec<RouteWrite>,
}

/// Load the declared routes file.
///
/// Only parsing happens here; every route still goes through the admin
/// write path before it is stored.
pub fn load_routes_file(path: &Path) -> Result<Vec<RouteWrite>, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_routes(&content)
}

pub fn parse_routes(content: &str) -> Result<Vec<RouteWrite>, ConfigError> {
    let file: RoutesFile = toml::from_str(content)?;
    Ok(file.routes)
}
