//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound pipeline:
//!     → rate_limit.rs (global token bucket admission)
//!     → auth.rs (bearer token, token-required routes only)
//!
//! Forwarding:
//!     → headers.rs (strip hop-by-hop, append X-Forwarded-For)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any token check failure
//! - Tokens and secrets never appear in logs or audit records

pub mod auth;
pub mod headers;
pub mod rate_limit;

pub use auth::{AuthError, AuthStage, TokenValidator};
pub use rate_limit::{RateLimitStage, TokenBucket};
