//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that every address parses as an absolute http(s) URL
//! - Validate value ranges (timeouts > 0, threshold > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>

use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid address '{address}' in {field}")]
    InvalidAddress { field: &'static str, address: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("trusted profile requires resolver.configured_address")]
    TrustedWithoutAddress,

    #[error("no candidate addresses configured")]
    NoCandidates,

    #[error("health path '{0}' must start with '/'")]
    RelativeHealthPath(String),

    #[error("directory.lookup_paths must not be empty")]
    NoLookupPaths,
}

fn check_address(field: &'static str, address: &str, errors: &mut Vec<ValidationError>) {
    let ok = Url::parse(address)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false);
    if !ok {
        errors.push(ValidationError::InvalidAddress {
            field,
            address: address.to_string(),
        });
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let resolver = &config.resolver;

    if let Some(addr) = &resolver.configured_address {
        check_address("resolver.configured_address", addr, &mut errors);
    } else if resolver.trusted {
        errors.push(ValidationError::TrustedWithoutAddress);
    }
    for addr in &resolver.fallback_addresses {
        check_address("resolver.fallback_addresses", addr, &mut errors);
    }
    if resolver.configured_address.is_none() && resolver.fallback_addresses.is_empty() {
        errors.push(ValidationError::NoCandidates);
    }

    for path in &resolver.health_paths {
        if !path.starts_with('/') {
            errors.push(ValidationError::RelativeHealthPath(path.clone()));
        }
    }

    if resolver.probe_timeout_ms == 0 {
        errors.push(ValidationError::Zero("resolver.probe_timeout_ms"));
    }
    if resolver.failure_threshold == 0 {
        errors.push(ValidationError::Zero("resolver.failure_threshold"));
    }
    if config.request.timeout_ms == 0 {
        errors.push(ValidationError::Zero("request.timeout_ms"));
    }
    if config.directory.ttl_secs == 0 {
        errors.push(ValidationError::Zero("directory.ttl_secs"));
    }
    if config.directory.lookup_paths.is_empty() {
        errors.push(ValidationError::NoLookupPaths);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
