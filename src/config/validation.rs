//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, windows nested)
//! - Reject trusted-proxy entries that would otherwise be dropped silently
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{GatewayConfig, PLACEHOLDER_API_KEY};
use crate::security::client_ip::parse_trusted_entry;

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
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

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    let rl = &config.rate_limit;
    for (field, value) in [
        ("rate_limit.burst_limit", rl.burst_limit),
        ("rate_limit.requests_per_minute", rl.requests_per_minute),
        ("rate_limit.requests_per_hour", rl.requests_per_hour),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }
    if rl.burst_limit > rl.requests_per_minute {
        errors.push(ValidationError::new(
            "rate_limit.burst_limit",
            "must not exceed requests_per_minute",
        ));
    }
    if rl.requests_per_minute > rl.requests_per_hour {
        errors.push(ValidationError::new(
            "rate_limit.requests_per_minute",
            "must not exceed requests_per_hour",
        ));
    }
    if rl.max_tracked_keys == 0 {
        errors.push(ValidationError::new(
            "rate_limit.max_tracked_keys",
            "must be greater than 0",
        ));
    }

    if config.cache.max_size == 0 {
        errors.push(ValidationError::new("cache.max_size", "must be greater than 0"));
    }
    if config.cache.ttl_seconds == 0 {
        errors.push(ValidationError::new("cache.ttl_seconds", "must be greater than 0"));
    }

    let trusted = config.proxy.trusted_proxies.trim();
    if trusted != "*" {
        for entry in trusted.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            if parse_trusted_entry(entry).is_none() {
                errors.push(ValidationError::new(
                    "proxy.trusted_proxies",
                    format!("'{entry}' is neither an IP address nor a CIDR range"),
                ));
            }
        }
    }

    match url::Url::parse(&config.answer.upstream_url) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {}
        Ok(u) => errors.push(ValidationError::new(
            "answer.upstream_url",
            format!("unsupported scheme '{}'", u.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("answer.upstream_url", e.to_string())),
    }
    if config.answer.timeout_secs == 0 {
        errors.push(ValidationError::new("answer.timeout_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set when the admin API is enabled",
            ));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("'{}' is not a socket address", config.admin.bind_address),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
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
        config.rate_limit.burst_limit = 0;
        config.cache.ttl_seconds = 0;
        config.proxy.trusted_proxies = "127.0.0.1, bogus, 10.0.0.0/33".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"rate_limit.burst_limit"));
        assert!(fields.contains(&"cache.ttl_seconds"));
        assert_eq!(
            fields.iter().filter(|f| **f == "proxy.trusted_proxies").count(),
            2
        );
    }

    #[test]
    fn test_windows_must_nest() {
        let mut config = GatewayConfig::default();
        config.rate_limit.burst_limit = 50;
        config.rate_limit.requests_per_hour = 20;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_trust_all_is_accepted() {
        let mut config = GatewayConfig::default();
        config.proxy.trusted_proxies = "*".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_admin_requires_real_key() {
        let mut config = GatewayConfig::default();
        config.admin.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "admin.api_key");

        config.admin.api_key = "s3cret".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_upstream_url_must_be_http() {
        let mut config = GatewayConfig::default();
        config.answer.upstream_url = "ftp://example.com/query".to_string();
        assert!(validate_config(&config).is_err());

        config.answer.upstream_url = "not a url".to_string();
        assert!(validate_config(&config).is_err());
    }
}
