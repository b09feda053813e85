//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::HostConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable naming the Runtime API host and port.
pub const RUNTIME_API_ENV: &str = "AWS_LAMBDA_RUNTIME_API";
/// Environment variable naming the logical handler.
pub const HANDLER_ENV: &str = "_HANDLER";
/// Environment variable switching on the local invoke server.
pub const LOCAL_SERVER_ENV: &str = "LOCAL_LAMBDA_SERVER_ENABLED";

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

/// Load, override from the process environment, and validate configuration
/// from a TOML file.
pub fn load_config(path: &Path) -> Result<HostConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse a TOML file and apply environment overrides. Not validated.
pub fn read_config(path: &Path) -> Result<HostConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: HostConfig = toml::from_str(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Defaults plus environment overrides. Not validated.
pub fn env_config() -> HostConfig {
    let mut config = HostConfig::default();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Apply environment overrides using `lookup` to resolve variables.
pub fn apply_env_overrides<F>(config: &mut HostConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(endpoint) = lookup(RUNTIME_API_ENV).filter(|v| !v.is_empty()) {
        config.runtime.api_endpoint = Some(endpoint);
    }
    if let Some(handler) = lookup(HANDLER_ENV).filter(|v| !v.is_empty()) {
        config.runtime.handler = Some(handler);
    }
    if let Some(flag) = lookup(LOCAL_SERVER_ENV) {
        config.local.enabled = matches!(flag.trim().to_ascii_lowercase().as_str(), "true" | "1");
    }
}
