//! Outbound transport subsystem.
//!
//! # Data Flow
//! ```text
//! OutboundRequest
//!     → security::rate_limit (admission)
//!     → security::auth (bearer token, token-required routes only)
//!     → audit::stage (request/response capture → audit logger)
//!     → resilience::retries (transport errors and 5xx)
//!     → client.rs (hyper client)
//!     → upstream
//! ```
//!
//! # Design Decisions
//! - Every stage implements [`Transport`] and owns the next stage
//! - Composition order is fixed by `pipeline::PipelineBuilder`
//! - Request bodies are buffered so attempts can be replayed; response
//!   bodies are always streamed

pub mod client;
pub mod context;
pub mod pipeline;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Response, Uri};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::security::auth::AuthError;

pub use client::HttpTransport;
pub use context::{ContextError, RequestContext};
pub use pipeline::{Pipeline, PipelineBuilder};

/// Boxed error from the network layer.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result of executing a request through a stage.
pub type TransportResult = Result<Response<Body>, TransportError>;

/// Errors produced by pipeline stages.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Context cancelled or deadline passed at a suspension point.
    #[error("request aborted: {0}")]
    Aborted(#[from] ContextError),

    /// Bearer token missing or rejected.
    #[error("authentication failed: {0}")]
    Unauthorized(#[from] AuthError),

    /// The outbound request could not be assembled.
    #[error("invalid outbound request: {0}")]
    InvalidRequest(#[from] axum::http::Error),

    /// Connection or protocol failure talking to the upstream.
    #[error("upstream request failed: {0}")]
    Upstream(#[source] BoxError),

    /// An error that has already been written to the audit log.
    #[error(transparent)]
    Recorded(Box<TransportError>),
}

impl TransportError {
    pub fn upstream(err: impl Into<BoxError>) -> Self {
        Self::Upstream(err.into())
    }

    /// Whether an audit record describing this error was already submitted.
    pub fn is_recorded(&self) -> bool {
        matches!(self, Self::Recorded(_))
    }

    /// Mark this error as recorded. Idempotent.
    pub fn recorded(self) -> Self {
        match self {
            Self::Recorded(_) => self,
            other => Self::Recorded(Box::new(other)),
        }
    }

    /// The underlying error with any `Recorded` wrapper removed.
    pub fn kind(&self) -> &TransportError {
        match self {
            Self::Recorded(inner) => inner.kind(),
            other => other,
        }
    }

    /// Transport-level failures are the only errors worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), Self::Upstream(_))
    }
}

/// Who sent the request and which service it is for.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub service: Arc<str>,
    pub client_addr: Option<SocketAddr>,
    pub request_id: Option<String>,
}

/// A fully buffered outbound request, cheap to clone for retries.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub meta: RequestMeta,
    pub context: RequestContext,
}

impl OutboundRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            meta: RequestMeta::default(),
            context: RequestContext::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

/// A request-execution stage: forwards to the next stage or short-circuits.
pub trait Transport: Send + Sync {
    fn execute(&self, request: OutboundRequest) -> BoxFuture<'_, TransportResult>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: OutboundRequest) -> BoxFuture<'_, TransportResult> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn execute(&self, request: OutboundRequest) -> BoxFuture<'_, TransportResult> {
        (**self).execute(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_is_idempotent() {
        let err = TransportError::upstream("connection refused").recorded().recorded();
        assert!(err.is_recorded());
        assert!(matches!(err.kind(), TransportError::Upstream(_)));
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "upstream request failed: connection refused");
    }

    #[test]
    fn test_aborted_is_not_retryable() {
        let err = TransportError::from(ContextError::Cancelled);
        assert!(!err.is_retryable());
        assert!(!err.is_recorded());
    }
}
