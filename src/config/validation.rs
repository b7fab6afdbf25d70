//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse, bcrypt cost)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Longest accepted token lifetime: one year.
pub const MAX_TOKEN_TTL_HOURS: u64 = 24 * 365;

/// Check every semantic constraint and collect the failures.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if let Some(secret) = &config.auth.jwt_secret {
        if secret.is_empty() {
            errors.push(ValidationError::new("auth.jwt_secret", "must not be empty"));
        }
    }
    if config.auth.token_ttl_hours == 0 {
        errors.push(ValidationError::new("auth.token_ttl_hours", "must be greater than 0"));
    } else if config.auth.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
        errors.push(ValidationError::new(
            "auth.token_ttl_hours",
            format!("must be at most {}", MAX_TOKEN_TTL_HOURS),
        ));
    }
    if !(4..=31).contains(&config.auth.bcrypt_cost) {
        errors.push(ValidationError::new("auth.bcrypt_cost", "must be between 4 and 31"));
    }

    let rl = &config.rate_limit;
    if rl.requests_per_second == 0 {
        errors.push(ValidationError::new("rate_limit.requests_per_second", "must be greater than 0"));
    }
    if rl.burst_size == 0 {
        errors.push(ValidationError::new("rate_limit.burst_size", "must be at least 1"));
    }
    if rl.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be greater than 0"));
    }
    if rl.idle_ttl_secs == 0 {
        errors.push(ValidationError::new("rate_limit.idle_ttl_secs", "must be greater than 0"));
    }

    if config.database.path.trim().is_empty() {
        errors.push(ValidationError::new("database.path", "must not be empty"));
    }

    let bootstrap = &config.bootstrap;
    if bootstrap.enabled {
        if bootstrap.username.trim().is_empty() {
            errors.push(ValidationError::new("bootstrap.username", "must not be empty"));
        }
        if !bootstrap.email.contains('@') {
            errors.push(ValidationError::new("bootstrap.email", "must be an email address"));
        }
        if bootstrap.password.len() < 6 {
            errors.push(ValidationError::new("bootstrap.password", "must be at least 6 characters"));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
