//! API gateway library.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (request ID, tracing)
//!                          │
//!                          ▼
//!                     routing::router ── unknown path ──▶ 404
//!                          │ exact path
//!                          ▼
//!                     http::proxy (method, body limit, outbound request)
//!                          │
//!                          ▼
//!     ┌──────────────── transport::Pipeline ────────────────┐
//!     │ security::rate_limit → security::auth →             │
//!     │ audit::stage → resilience::retries → transport::client ──▶ Upstream
//!     └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//!                     audit::logger (bounded queue) ──▶ audit::store
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;
pub mod transport;

// Cross-cutting concerns
pub mod audit;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::{GatewayConfig, RoutesConfig};
pub use http::{Gateway, GatewayError};
pub use lifecycle::Shutdown;
