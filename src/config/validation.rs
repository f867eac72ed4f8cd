//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds > 0, ratios in (0, 1])
//! - Detect duplicate dependency names and unparsable addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::{BreakerConfig, GuardConfig};

/// One semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("server.bind_address", "not a socket address"));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }

    let load = &config.load;
    if load.sample_window_ms == 0 {
        errors.push(ValidationError::new("load.sample_window_ms", "must be > 0"));
    }
    if load.max_samples == 0 {
        errors.push(ValidationError::new("load.max_samples", "must be > 0"));
    }
    if load.min_samples > load.max_samples {
        errors.push(ValidationError::new("load.min_samples", "must not exceed max_samples"));
    }
    if !(load.error_rate_high > 0.0 && load.error_rate_high <= 1.0) {
        errors.push(ValidationError::new("load.error_rate_high", "must be in (0, 1]"));
    }

    let mut seen = HashSet::new();
    for (i, dep) in config.dependencies.iter().enumerate() {
        let prefix = format!("dependencies[{i}]");
        if dep.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("{prefix}.name"), "must not be empty"));
        } else if !seen.insert(dep.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{prefix}.name"),
                format!("duplicate dependency '{}'", dep.name),
            ));
        }
        if let Some(base_url) = &dep.base_url {
            if url::Url::parse(base_url).is_err() {
                errors.push(ValidationError::new(format!("{prefix}.base_url"), "not a valid URL"));
            }
        }
        if dep.timeout_ms == 0 {
            errors.push(ValidationError::new(format!("{prefix}.timeout_ms"), "must be > 0"));
        }
        validate_breaker(&format!("{prefix}.breaker"), &dep.breaker, &mut errors);
    }

    if config.probe.enabled && config.probe.interval_secs == 0 {
        errors.push(ValidationError::new("probe.interval_secs", "must be > 0"));
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::new("admin.api_key", "must be set when admin is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_breaker(prefix: &str, breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    let checks = [
        ("failure_threshold", breaker.failure_threshold == 0),
        ("success_threshold", breaker.success_threshold == 0),
        ("timeout_ms", breaker.timeout_ms == 0),
        ("window_ms", breaker.window_ms == 0),
    ];
    for (field, is_zero) in checks {
        if is_zero {
            errors.push(ValidationError::new(format!("{prefix}.{field}"), "must be > 0"));
        }
    }
}
