//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → retries.rs (re-issue on transport errors and 5xx)
//!     → backoff.rs (delay between attempts, optionally exponential)
//! ```
//!
//! # Design Decisions
//! - Every wait races the request context; nothing outlives its deadline
//! - 4xx responses are final; only transport failures and 5xx are retried
//! - All resilience logic is a composable pipeline stage

pub mod backoff;
pub mod retries;

pub use retries::{RetryPolicy, RetryStage};
