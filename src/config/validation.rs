//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (rates > 0, attempts >= 1)
//! - Check every endpoint can be compiled into a route
//! - Require a token secret when any endpoint needs one
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function over the parsed documents
//! - Duplicate paths are not errors; the route table resolves them

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, RoutesConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rate_limit.requests_per_second must be positive")]
    NonPositiveRate,

    #[error("rate_limit.burst_size must be at least 1")]
    ZeroBurst,

    #[error("retries.max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("audit.queue_capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("timeouts.request_secs must be at least 1")]
    ZeroRequestTimeout,

    #[error("target {service:?}: invalid baseUrl {url:?}: {reason}")]
    InvalidBaseUrl { service: String, url: String, reason: String },

    #[error("target {service:?}: endpoint {path:?} has invalid method {method:?}")]
    InvalidMethod { service: String, path: String, method: String },

    #[error("target {service:?}: endpoint path {path:?} must start with '/' and contain no '{{', '}}', '*' or ':' segments")]
    InvalidPath { service: String, path: String },

    #[error("endpoint {path:?} requires a token but auth.secret is empty")]
    MissingSecret { path: String },
}

/// Whether `path` can be registered as a literal route.
pub fn is_literal_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.contains(['{', '}', '*'])
        && !path.split('/').any(|segment| segment.starts_with(':'))
}

/// Validate the runtime settings.
pub fn validate_settings(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !(config.rate_limit.requests_per_second > 0.0) {
        errors.push(ValidationError::NonPositiveRate);
    }
    if config.rate_limit.burst_size == 0 {
        errors.push(ValidationError::ZeroBurst);
    }
    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::ZeroAttempts);
    }
    if config.audit.queue_capacity == 0 {
        errors.push(ValidationError::ZeroQueueCapacity);
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Validate the route table against the settings it will run under.
pub fn validate_routes(routes: &RoutesConfig, config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for target in &routes.targets {
        match Url::parse(&target.base_url) {
            Ok(url) if url.scheme() == "http" && url.has_host() => {}
            Ok(url) => errors.push(ValidationError::InvalidBaseUrl {
                service: target.service.clone(),
                url: target.base_url.clone(),
                reason: format!("unsupported scheme {:?} or missing host", url.scheme()),
            }),
            Err(e) => errors.push(ValidationError::InvalidBaseUrl {
                service: target.service.clone(),
                url: target.base_url.clone(),
                reason: e.to_string(),
            }),
        }

        for (prefix, endpoints) in &target.endpoints {
            for endpoint in endpoints {
                if Method::from_bytes(endpoint.method.to_ascii_uppercase().as_bytes()).is_err() {
                    errors.push(ValidationError::InvalidMethod {
                        service: target.service.clone(),
                        path: endpoint.path.clone(),
                        method: endpoint.method.clone(),
                    });
                }
                if !is_literal_path(&endpoint.path) || prefix.contains(['{', '}', '*']) {
                    errors.push(ValidationError::InvalidPath {
                        service: target.service.clone(),
                        path: endpoint.path.clone(),
                    });
                }
                if endpoint.token_required && config.auth.secret.is_empty() {
                    errors.push(ValidationError::MissingSecret {
                        path: endpoint.path.clone(),
                    });
                }
            }
        }
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{Endpoint, Target};

    fn routes(base_url: &str, endpoint: Endpoint) -> RoutesConfig {
        RoutesConfig {
            targets: vec![Target {
                base_url: base_url.into(),
                service: "svc".into(),
                endpoints: [("/api".to_string(), vec![endpoint])].into_iter().collect(),
            }],
        }
    }

    fn endpoint(path: &str, method: &str, token_required: bool) -> Endpoint {
        Endpoint {
            path: path.into(),
            method: method.into(),
            description: String::new(),
            token_required,
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_settings(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_setting_errors() {
        let mut config = GatewayConfig::default();
        config.rate_limit.requests_per_second = 0.0;
        config.rate_limit.burst_size = 0;
        config.retries.max_attempts = 0;
        let errors = validate_settings(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::NonPositiveRate,
                ValidationError::ZeroBurst,
                ValidationError::ZeroAttempts
            ]
        );
    }

    #[test]
    fn test_route_errors() {
        let config = GatewayConfig::default();

        let ok = routes("http://up.example", endpoint("/users", "get", false));
        assert_eq!(validate_routes(&ok, &config), Ok(()));

        let bad_url = routes("ftp://up.example", endpoint("/users", "GET", false));
        assert!(matches!(
            validate_routes(&bad_url, &config).unwrap_err()[0],
            ValidationError::InvalidBaseUrl { .. }
        ));

        let bad_path = routes("http://up.example", endpoint("users/{id}", "GET", false));
        assert!(matches!(
            validate_routes(&bad_path, &config).unwrap_err()[0],
            ValidationError::InvalidPath { .. }
        ));

        let bad_method = routes("http://up.example", endpoint("/users", "GE T", false));
        assert!(matches!(
            validate_routes(&bad_method, &config).unwrap_err()[0],
            ValidationError::InvalidMethod { .. }
        ));

        let needs_secret = routes("http://up.example", endpoint("/me", "GET", true));
        assert_eq!(
            validate_routes(&needs_secret, &config).unwrap_err(),
            vec![ValidationError::MissingSecret { path: "/me".into() }]
        );
    }

    #[test]
    fn test_literal_paths() {
        assert!(is_literal_path("/"));
        assert!(is_literal_path("/users/me"));
        assert!(!is_literal_path("users"));
        assert!(!is_literal_path("/users/:id"));
        assert!(!is_literal_path("/files/*rest"));
    }
}
