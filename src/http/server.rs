//! Gateway assembly and serving.
//!
//! # Responsibilities
//! - Compile the route table and build exactly two pipelines (open and
//!   token-required) over one limiter, one audit logger and one client
//! - Create the Axum router with request-ID and tracing layers
//! - Serve until shutdown, then drain the audit queue

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::audit::{AuditLogger, AuditStore};
use crate::config::{GatewayConfig, RoutesConfig};
use crate::http::proxy::ProxyHandler;
use crate::http::request::X_REQUEST_ID;
use crate::resilience::retries::RetryPolicy;
use crate::routing::{build_router, RouteError, RouteTable};
use crate::security::auth::TokenValidator;
use crate::security::rate_limit::TokenBucket;
use crate::transport::{HttpTransport, Pipeline, Transport};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid route table: {0}")]
    Routes(#[from] RouteError),

    #[error("route {0:?} requires a token but no auth secret is configured")]
    MissingSecret(String),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application context: everything shared by all routes.
pub struct Gateway {
    config: GatewayConfig,
    routes: RouteTable,
    limiter: Arc<TokenBucket>,
    audit: Arc<AuditLogger>,
    open: Pipeline,
    guarded: Pipeline,
}

impl Gateway {
    /// Build a gateway talking to upstreams over HTTP.
    ///
    /// Must be called inside a Tokio runtime (the audit consumer is spawned).
    pub fn new(
        config: GatewayConfig,
        routes: &RoutesConfig,
        store: Arc<dyn AuditStore>,
    ) -> Result<Self, GatewayError> {
        let base = HttpTransport::new(&config.timeouts);
        Self::with_transport(config, routes, store, Arc::new(base))
    }

    /// Build a gateway over an arbitrary base transport.
    pub fn with_transport(
        config: GatewayConfig,
        routes: &RoutesConfig,
        store: Arc<dyn AuditStore>,
        base: Arc<dyn Transport>,
    ) -> Result<Self, GatewayError> {
        let routes = RouteTable::from_config(routes)?;
        if config.auth.secret.is_empty() {
            if let Some(route) = routes.iter().find(|r| r.auth_required) {
                return Err(GatewayError::MissingSecret(route.path.clone()));
            }
        }

        let limiter = Arc::new(TokenBucket::new(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst_size,
        ));
        let validator = Arc::new(TokenValidator::new(config.auth.secret.as_bytes()));
        let audit = AuditLogger::spawn(store, &config.audit);
        let policy = RetryPolicy::from(&config.retries);

        let builder = || {
            Pipeline::builder()
                .rate_limit(limiter.clone())
                .audit(audit.clone())
                .capture_limit(config.audit.capture_limit_bytes)
                .retry(policy)
        };
        let open = builder().build(base.clone());
        let guarded = builder().auth(validator).build(base);

        tracing::info!(
            routes = routes.len(),
            rps = config.rate_limit.requests_per_second,
            burst = config.rate_limit.burst_size,
            max_attempts = config.retries.max_attempts,
            "Gateway initialized"
        );

        Ok(Self {
            config,
            routes,
            limiter,
            audit,
            open,
            guarded,
        })
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        let handlers = self.routes.iter().map(|route| {
            let pipeline = if route.auth_required {
                self.guarded.clone()
            } else {
                self.open.clone()
            };
            ProxyHandler::new(Arc::new(route.clone()), pipeline, self.audit.clone())
                .max_body_bytes(self.config.limits.max_body_bytes)
                .request_timeout(Duration::from_secs(self.config.timeouts.request_secs))
                .capture_limit(self.config.audit.capture_limit_bytes)
        });

        build_router(handlers).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
        )
    }

    /// Serve on `listener` until `shutdown` fires, then close the audit logger.
    pub async fn run(
        &self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), GatewayError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.routes.len(), "HTTP server starting");

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await;

        tracing::info!("HTTP server stopped");
        self.close().await;
        served?;
        Ok(())
    }

    /// Stop accepting audit records and wait for the queue to drain.
    pub async fn close(&self) {
        self.audit.close().await;
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    pub fn limiter(&self) -> &Arc<TokenBucket> {
        &self.limiter
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
