//! Base network transport.
//!
//! # Responsibilities
//! - Turn an [`OutboundRequest`] into a hyper request
//! - Issue it on a shared, pooled hyper client
//! - Abort the call when the request context ends
//!
//! # Design Decisions
//! - One client (one connection pool) per gateway, cloned into pipelines
//! - Plain HTTP only; TLS to upstreams is out of scope

use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::TimeoutConfig;
use crate::transport::{OutboundRequest, Transport, TransportError, TransportResult};

/// The innermost stage: talks to the upstream over the network.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
}

impl HttpTransport {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
            .build(connector);

        Self { client }
    }

    fn build_request(request: &OutboundRequest) -> Result<Request<Body>, TransportError> {
        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(request.uri.clone());

        if let Some(headers) = builder.headers_mut() {
            headers.extend(request.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        Ok(builder.body(Body::from(request.body.clone()))?)
    }
}

impl Transport for HttpTransport {
    fn execute(&self, request: OutboundRequest) -> BoxFuture<'_, TransportResult> {
        Box::pin(async move {
            let outbound = Self::build_request(&request)?;

            tracing::debug!(
                method = %request.method,
                uri = %request.uri,
                "Sending upstream request"
            );

            tokio::select! {
                result = self.client.request(outbound) => {
                    let response = result.map_err(TransportError::upstream)?;
                    let (parts, body) = response.into_parts();
                    Ok(axum::http::Response::from_parts(parts, Body::new(body)))
                }
                reason = request.context.done() => Err(reason.into()),
            }
        })
    }
}
