//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Overrides `gateway.bind_address`.
pub const GATEWAY_ADDRESS_ENV: &str = "GATEWAY_ADDRESS";

/// Overrides `workers.bind_address`.
pub const WORKER_ADDRESS_ENV: &str = "WORKER_ADDRESS";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
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

/// Load, apply environment overrides and validate.
///
/// Without a path the defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };
    apply_overrides(&mut config, |name| std::env::var(name).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply environment overrides, reading variables through `lookup`.
pub fn apply_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(address) = lookup(GATEWAY_ADDRESS_ENV).filter(|v| !v.is_empty()) {
        config.gateway.bind_address = normalize_address(&address);
    }
    if let Some(address) = lookup(WORKER_ADDRESS_ENV).filter(|v| !v.is_empty()) {
        config.workers.bind_address = normalize_address(&address);
    }
}

/// Accept the port-only form ":9001" as "0.0.0.0:9001".
fn normalize_address(address: &str) -> String {
    match address.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{}", port),
        None => address.to_string(),
    }
}
