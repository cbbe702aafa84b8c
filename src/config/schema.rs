//! Configuration schema definitions.
//!
//! Two documents configure the gateway:
//! - [`GatewayConfig`]: runtime settings (TOML), every field defaulted
//! - [`RoutesConfig`]: the upstream route table (JSON)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root runtime configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Path of the JSON route table.
    pub routes_path: String,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Global admission control.
    pub rate_limit: RateLimitConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Bearer token verification.
    pub auth: AuthConfig,

    /// Audit queue and persistence.
    pub audit: AuditConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            routes_path: "endpoints.json".to_string(),
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retries: RetryConfig::default(),
            auth: AuthConfig::default(),
            audit: AuditConfig::default(),
            limits: LimitsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for one proxied request, admission wait and retries included.
    pub request_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 10,
            idle_secs: 60,
        }
    }
}

/// Token bucket settings shared by all routes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Refill rate in tokens per second.
    pub requests_per_second: f64,

    /// Bucket capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10.0,
            burst_size: 20,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per request, including the first.
    pub max_attempts: u32,

    /// Delay between attempts in milliseconds.
    pub delay_ms: u64,

    /// When greater than `delay_ms`, delays grow exponentially up to this cap.
    pub max_delay_ms: u64,

    /// Retry only idempotent methods.
    pub idempotent_only: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
            max_delay_ms: 0,
            idempotent_only: false,
        }
    }
}

/// Bearer token configuration.
#[derive(Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HMAC secret used to verify tokens.
    pub secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &if self.secret.is_empty() { "<unset>" } else { "<redacted>" })
            .finish()
    }
}

/// Audit logger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Bounded queue size; records beyond it are dropped.
    pub queue_capacity: usize,

    /// Upper bound on one store call in milliseconds.
    pub store_timeout_ms: u64,

    /// Body bytes kept per request/response snapshot.
    pub capture_limit_bytes: usize,

    /// JSON-lines file the binary appends records to.
    pub path: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            store_timeout_ms: 5_000,
            capture_limit_bytes: 64 * 1024,
            path: "audit.jsonl".to_string(),
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable output.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// The route table document.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct RoutesConfig {
    pub targets: Vec<Target>,
}

/// One upstream service and its endpoints grouped by base-path prefix.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Target {
    #[serde(rename = "baseUrl")]
    pub base_url: String,

    pub service: String,

    /// Prefix → endpoints. Ordered by prefix.
    #[serde(default)]
    pub endpoints: BTreeMap<String, Vec<Endpoint>>,
}

/// One routable endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Endpoint {
    pub path: String,

    pub method: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "tokenRequired", default)]
    pub token_required: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_json_shape() {
        let json = r#"{
            "targets": [{
                "baseUrl": "http://up.example",
                "service": "users",
                "endpoints": {
                    "/api": [
                        { "path": "/users", "method": "GET", "description": "list", "tokenRequired": false },
                        { "path": "/users/me", "method": "GET", "tokenRequired": true }
                    ]
                }
            }]
        }"#;

        let routes: RoutesConfig = serde_json::from_str(json).unwrap();
        let target = &routes.targets[0];
        assert_eq!(target.base_url, "http://up.example");
        assert_eq!(target.service, "users");
        let eps = &target.endpoints["/api"];
        assert_eq!(eps.len(), 2);
        assert!(!eps[0].token_required);
        assert!(eps[1].token_required);
        assert_eq!(eps[1].description, "");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            routes_path = "conf/routes.json"

            [rate_limit]
            requests_per_second = 2.5

            [auth]
            secret = "s3cret"
            "#,
        )
        .unwrap();

        assert_eq!(config.routes_path, "conf/routes.json");
        assert_eq!(config.rate_limit.requests_per_second, 2.5);
        assert_eq!(config.rate_limit.burst_size, 20);
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.timeouts.request_secs, 10);
        assert!(!format!("{:?}", config.auth).contains("s3cret"));
    }
}
