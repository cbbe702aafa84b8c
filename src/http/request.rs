//! Request identification.
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing (see `server::Gateway::router`)
//! - A client-supplied `x-request-id` is kept; otherwise a UUID v4 is generated
//! - The same ID is echoed on the response and copied into audit records

use axum::http::{HeaderMap, HeaderName};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request ID carried in `headers`, if any.
pub fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
