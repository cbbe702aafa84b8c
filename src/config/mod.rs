//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml (settings)          endpoints.json (route table)
//!     → loader.rs (parse)              → loader.rs (parse)
//!     → validation.rs                  → validation.rs (against settings)
//!     → GatewayConfig                  → RoutesConfig
//!                 ↘                  ↙
//!                   http::server::Gateway (built once, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; no runtime reconfiguration
//! - All settings have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_routes, parse_routes, ConfigError};
pub use schema::{
    AuditConfig, AuthConfig, Endpoint, GatewayConfig, LimitsConfig, ListenerConfig,
    ObservabilityConfig, RateLimitConfig, RetryConfig, RoutesConfig, Target, TimeoutConfig,
};
pub use validation::ValidationError;
