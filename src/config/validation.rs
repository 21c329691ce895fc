//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses parse and value ranges are sane
//! - Check propagation bounds are consistent
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: invalid socket address `{value}`")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("propagation.delivery_delay_ms ({delay}) must be below propagation.settle_timeout_ms ({settle})")]
    DelayExceedsSettle { delay: u64, settle: u64 },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let positive = [
        ("listener.workers", config.listener.workers as u64),
        ("listener.request_timeout_secs", config.listener.request_timeout_secs),
        ("propagation.settle_timeout_ms", config.propagation.settle_timeout_ms),
        ("propagation.channel_capacity", config.propagation.channel_capacity as u64),
        ("script.exec_timeout_ms", config.script.exec_timeout_ms),
        ("script.max_source_bytes", config.script.max_source_bytes as u64),
        ("observability.script_log_capacity", config.observability.script_log_capacity as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.propagation.delivery_delay_ms >= config.propagation.settle_timeout_ms
        && config.propagation.settle_timeout_ms > 0
    {
        errors.push(ValidationError::DelayExceedsSettle {
            delay: config.propagation.delivery_delay_ms,
            settle: config.propagation.settle_timeout_ms,
        });
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
