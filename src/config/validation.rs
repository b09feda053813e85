//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that an event source is configured
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: HostConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::HostConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("runtime.api_endpoint is required unless local.enabled is set")]
    MissingEventSource,

    #[error("local.queue_capacity must be greater than zero")]
    ZeroQueueCapacity,

    #[error("shutdown.signals must name at least one signal")]
    NoShutdownSignals,
}

/// Validate a configuration, collecting every violation.
pub fn validate_config(config: &HostConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.client.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "client.connect_timeout_secs" });
    }
    if config.client.read_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "client.read_timeout_secs" });
    }

    if config.local.enabled {
        check_address(&mut errors, "local.bind_address", &config.local.bind_address);
        if config.local.queue_capacity == 0 {
            errors.push(ValidationError::ZeroQueueCapacity);
        }
        if config.local.invocation_timeout_secs == 0 {
            errors.push(ValidationError::ZeroTimeout { field: "local.invocation_timeout_secs" });
        }
    } else if config
        .runtime
        .api_endpoint
        .as_deref()
        .map_or(true, |endpoint| endpoint.trim().is_empty())
    {
        errors.push(ValidationError::MissingEventSource);
    }

    if config.shutdown.signals.is_empty() {
        errors.push(ValidationError::NoShutdownSignals);
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> HostConfig {
        let mut config = HostConfig::default();
        config.local.enabled = true;
        config
    }

    #[test]
    fn test_local_defaults_are_valid() {
        assert!(validate_config(&local_config()).is_ok());
    }

    #[test]
    fn test_missing_event_source() {
        let errors = validate_config(&HostConfig::default()).unwrap_err();
        assert_eq!(errors, vec![ValidationError::MissingEventSource]);
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = local_config();
        config.client.connect_timeout_secs = 0;
        config.client.read_timeout_secs = 0;
        config.local.bind_address = "not-an-address".to_string();
        config.shutdown.signals.clear();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::NoShutdownSignals));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidAddress { field: "local.bind_address", .. })));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = local_config();
        config.observability.metrics_address = "bogus".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
