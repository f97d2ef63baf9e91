//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the decoded config
//! - Runs before config is accepted into the system

use crate::config::schema::ServerConfig;

/// A single semantic violation in a decoded configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
    EmptyBindAddress,
    ZeroRateLimit,
    ZeroRateInterval,
    ZeroSweepInterval,
    ZeroReadTimeout,
    ZeroWriteTimeout,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::EmptyBindAddress => {
                write!(f, "listener.bind_address must not be empty")
            }
            ValidationError::ZeroRateLimit => {
                write!(f, "rate_limit.limit must be greater than zero")
            }
            ValidationError::ZeroRateInterval => {
                write!(f, "rate_limit.interval_secs must be greater than zero")
            }
            ValidationError::ZeroSweepInterval => {
                write!(f, "rate_limit.sweep_interval_secs must be greater than zero")
            }
            ValidationError::ZeroReadTimeout => {
                write!(f, "timeouts.read_secs must be greater than zero")
            }
            ValidationError::ZeroWriteTimeout => {
                write!(f, "timeouts.write_secs must be greater than zero")
            }
        }
    }
}

/// Check a decoded config for semantic violations, collecting every failure.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::EmptyBindAddress);
    }
    if config.rate_limit.limit == 0 {
        errors.push(ValidationError::ZeroRateLimit);
    }
    if config.rate_limit.interval_secs == 0 {
        errors.push(ValidationError::ZeroRateInterval);
    }
    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }
    if config.timeouts.read_secs == 0 {
        errors.push(ValidationError::ZeroReadTimeout);
    }
    if config.timeouts.write_secs == 0 {
        errors.push(ValidationError::ZeroWriteTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
