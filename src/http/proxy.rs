//! Per-route proxy handler.
//!
//! # Responsibilities
//! - Enforce the route's method and the inbound body limit
//! - Build the outbound request and run it through the route's pipeline
//! - Map every failure to an HTTP status and exactly one audit record
//!
//! # Design Decisions
//! - Records the logging stage already wrote are never written again
//! - A request abandoned mid-flight is recorded when its future is dropped
//! - Upstream responses are passed through untouched, body streamed

use std::error::Error as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{request::Parts, Request, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use http_body_util::LengthLimitError;

use crate::audit::dump::dump_request;
use crate::audit::{AuditLogger, RecordDraft};
use crate::http::request::request_id;
use crate::observability::metrics;
use crate::routing::Route;
use crate::security::headers::forward_headers;
use crate::transport::{OutboundRequest, Pipeline, RequestContext, RequestMeta};

/// Handles every inbound request for one route.
#[derive(Clone)]
pub struct ProxyHandler {
    route: Arc<Route>,
    pipeline: Pipeline,
    audit: Arc<AuditLogger>,
    max_body_bytes: usize,
    request_timeout: Duration,
    capture_limit: usize,
}

impl ProxyHandler {
    pub fn new(route: Arc<Route>, pipeline: Pipeline, audit: Arc<AuditLogger>) -> Self {
        Self {
            route,
            pipeline,
            audit,
            max_body_bytes: 2 * 1024 * 1024,
            request_timeout: Duration::from_secs(10),
            capture_limit: crate::transport::pipeline::DEFAULT_CAPTURE_LIMIT,
        }
    }

    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn capture_limit(mut self, bytes: usize) -> Self {
        self.capture_limit = bytes;
        self
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub async fn handle(self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let method = request.method().to_string();
        let response = self.proxy(request).await;
        metrics::record_request(&self.route.path, &method, response.status().as_u16(), start);
        response
    }

    async fn proxy(&self, request: Request<Body>) -> Response {
        let (parts, body) = request.into_parts();
        let client_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let request_id = request_id(&parts.headers);
        let meta = RequestMeta {
            service: self.route.service.clone(),
            client_addr,
            request_id: request_id.clone(),
        };

        let mut guard = RecordGuard::new(
            self.audit.clone(),
            RecordDraft::new(
                &meta,
                parts.method.clone(),
                self.route.upstream.to_string(),
                self.snapshot(&parts, None),
            ),
        );

        if parts.method != self.route.method {
            tracing::debug!(
                request_id = ?request_id,
                method = %parts.method,
                expected = %self.route.method,
                path = %self.route.path,
                "Method not allowed"
            );
            let message = StatusCode::METHOD_NOT_ALLOWED.canonical_reason().unwrap_or_default();
            return guard.reject(StatusCode::METHOD_NOT_ALLOWED, message.to_string());
        }

        let body = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(body) => body,
            Err(e) if is_length_limit(&e) => {
                tracing::warn!(
                    request_id = ?request_id,
                    limit = self.max_body_bytes,
                    path = %self.route.path,
                    "Request body too large"
                );
                return guard.reject(
                    StatusCode::PAYLOAD_TOO_LARGE,
                    format!("request body exceeds {} bytes", self.max_body_bytes),
                );
            }
            Err(e) => {
                tracing::warn!(request_id = ?request_id, error = %e, "Failed to read request body");
                return guard.reject(StatusCode::BAD_REQUEST, format!("failed to read request body: {e}"));
            }
        };
        guard.set_request(self.snapshot(&parts, Some(body.as_ref())));

        let target = match target_uri(&self.route.upstream, parts.uri.query()) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(request_id = ?request_id, error = %e, "Failed to build upstream URL");
                return guard.reject(StatusCode::BAD_GATEWAY, e.to_string());
            }
        };

        let outbound = OutboundRequest::new(parts.method.clone(), target)
            .with_headers(forward_headers(&parts.headers, client_addr))
            .with_body(body)
            .with_meta(meta)
            .with_context(RequestContext::with_timeout(self.request_timeout));

        match self.pipeline.execute(outbound).await {
            Ok(response) => {
                guard.disarm();
                response
            }
            Err(err) => {
                tracing::warn!(
                    request_id = ?request_id,
                    path = %self.route.path,
                    upstream = %self.route.upstream,
                    error = %err,
                    "Proxy request failed"
                );
                if err.is_recorded() {
                    guard.disarm();
                    (StatusCode::BAD_GATEWAY, err.to_string()).into_response()
                } else {
                    guard.reject(StatusCode::BAD_GATEWAY, err.to_string())
                }
            }
        }
    }

    fn snapshot(&self, parts: &Parts, body: Option<&[u8]>) -> String {
        dump_request(&parts.method, &parts.uri, &parts.headers, body, self.capture_limit)
    }
}

/// The route's upstream URL with the inbound query string carried over.
fn target_uri(upstream: &Uri, query: Option<&str>) -> Result<Uri, axum::http::uri::InvalidUri> {
    match query {
        Some(query) if !query.is_empty() => format!("{upstream}?{query}").parse(),
        _ => Ok(upstream.clone()),
    }
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source = err.source();
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Holds the pending record for a request the handler itself owns.
///
/// Dropping an armed guard means the handler future was abandoned.
struct RecordGuard {
    logger: Arc<AuditLogger>,
    draft: Option<RecordDraft>,
}

impl RecordGuard {
    fn new(logger: Arc<AuditLogger>, draft: RecordDraft) -> Self {
        Self {
            logger,
            draft: Some(draft),
        }
    }

    fn set_request(&mut self, request: String) {
        if let Some(draft) = self.draft.as_mut() {
            draft.request = request;
        }
    }

    /// Record a failure answered by the handler and build its response.
    fn reject(&mut self, status: StatusCode, error: String) -> Response {
        if let Some(draft) = self.draft.take() {
            self.logger.submit(draft.failed(Some(status), error.clone()));
        }
        (status, error).into_response()
    }

    fn disarm(&mut self) {
        self.draft = None;
    }
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        if let Some(draft) = self.draft.take() {
            tracing::debug!(endpoint = %draft.endpoint, "Request abandoned before completion");
            self.logger.submit(draft.failed(None, "request abandoned before completion"));
        }
    }
}
