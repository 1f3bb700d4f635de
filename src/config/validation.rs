//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges and address formats
//! - Detect listeners bound to the same address
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("gateway.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
    #[error("observability.log_level: unknown level {0:?}")]
    InvalidLogLevel(String),
    #[error("gateway and workers listeners both bind {0}")]
    ListenerConflict(String),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let gateway = check_address(
        "gateway.bind_address",
        &config.gateway.bind_address,
        &mut errors,
    );
    let workers = check_address(
        "workers.bind_address",
        &config.workers.bind_address,
        &mut errors,
    );
    if config.observability.metrics_enabled {
        check_address(
            "observability.metrics_address",
            &config.observability.metrics_address,
            &mut errors,
        );
    }

    if let (Some(gateway), Some(workers)) = (gateway, workers) {
        if gateway == workers && gateway.port() != 0 {
            errors.push(ValidationError::ListenerConflict(gateway.to_string()));
        }
    }

    if config.gateway.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(
    field: &'static str,
    value: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<SocketAddr> {
    match value.parse() {
        Ok(addr) => Some(addr),
        Err(_) => {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.to_string(),
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = GatewayConfig::default();
        config.gateway.bind_address = ":9001".into();
        config.gateway.max_body_bytes = 0;
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::ZeroBodyLimit));
        assert!(errors.contains(&ValidationError::InvalidLogLevel("loud".into())));
    }

    #[test]
    fn test_listener_conflict() {
        let mut config = GatewayConfig::default();
        config.gateway.bind_address = "127.0.0.1:7000".into();
        config.workers.bind_address = "127.0.0.1:7000".into();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::ListenerConflict("127.0.0.1:7000".into())])
        );
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = GatewayConfig::default();
        config.observability.metrics_address = "nowhere".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
