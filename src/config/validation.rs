//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and shapes.
//! Every problem is reported, not just the first one found.

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
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

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "listener.request_timeout_secs",
            "must be greater than zero",
        ));
    }

    // Disabled sections are still checked so flipping `enabled` never
    // surfaces a latent error at runtime.
    if config.rate_limit.capacity == 0 {
        errors.push(ValidationError::new(
            "rate_limit.capacity",
            "must be greater than zero",
        ));
    }
    if config.rate_limit.refill_interval_ms == 0 {
        errors.push(ValidationError::new(
            "rate_limit.refill_interval_ms",
            "must be greater than zero",
        ));
    }

    if config.concurrency.max_in_flight == 0 {
        errors.push(ValidationError::new(
            "concurrency.max_in_flight",
            "must be greater than zero",
        ));
    }

    if config.breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "breaker.failure_threshold",
            "must be greater than zero",
        ));
    }
    if config.breaker.open_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "breaker.open_timeout_ms",
            "must be greater than zero",
        ));
    }

    if let Some(raw) = &config.upstream.url {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::new(
                "upstream.url",
                format!("unsupported scheme '{}'", url.scheme()),
            )),
            Err(e) => errors.push(ValidationError::new("upstream.url", e.to_string())),
        }
    }
    if config.upstream.timeout_ms == 0 {
        errors.push(ValidationError::new(
            "upstream.timeout_ms",
            "must be greater than zero",
        ));
    }
    // The breaker only sees an outcome if the upstream call ends before the
    // request timeout drops the handler.
    let request_timeout_ms = config.listener.request_timeout_secs.saturating_mul(1000);
    if request_timeout_ms > 0 && config.upstream.timeout_ms >= request_timeout_ms {
        errors.push(ValidationError::new(
            "upstream.timeout_ms",
            format!(
                "must be below the request timeout ({} ms)",
                request_timeout_ms
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
