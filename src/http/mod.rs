//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request-ID and trace layers)
//!     → routing::router (exact path dispatch)
//!     → proxy.rs (method/body checks, outbound request, pipeline)
//!     → upstream response streamed back to the client
//! ```

pub mod proxy;
pub mod request;
pub mod server;

pub use proxy::ProxyHandler;
pub use request::{request_id, X_REQUEST_ID};
pub use server::{Gateway, GatewayError};
