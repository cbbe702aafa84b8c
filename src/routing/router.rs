//! Axum router assembly.
//!
//! # Responsibilities
//! - Register one handler per compiled route, exact path match
//! - Answer unknown paths with 404 without touching the audit log
//!
//! # Design Decisions
//! - Handlers accept any method so mismatches reach the handler and are
//!   recorded as 405
//! - Paths are unique by construction (see `RouteTable`), so registration
//!   cannot conflict

use axum::extract::Request;
use axum::http::{StatusCode, Uri};
use axum::routing::any;
use axum::Router;

use crate::http::proxy::ProxyHandler;

/// Build the inbound router from per-route handlers.
pub fn build_router(handlers: impl IntoIterator<Item = ProxyHandler>) -> Router {
    let mut router = Router::new();
    for handler in handlers {
        let path = handler.route().path.clone();
        tracing::info!(
            method = %handler.route().method,
            path = %path,
            upstream = %handler.route().upstream,
            "Setting up route"
        );
        router = router.route(&path, any(move |request: Request| handler.clone().handle(request)));
    }
    router.fallback(not_found)
}

async fn not_found(uri: Uri) -> (StatusCode, &'static str) {
    tracing::debug!(path = %uri.path(), "No route matched");
    (StatusCode::NOT_FOUND, "404 page not found")
}
