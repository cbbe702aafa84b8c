//! Compiled route table.
//!
//! # Responsibilities
//! - Turn the route document into inbound path → [`Route`]
//! - Compute each upstream URL from base URL, prefix and endpoint path
//! - Resolve duplicate inbound paths deterministically
//!
//! # Design Decisions
//! - Inbound routes are the endpoint paths themselves; the prefix only
//!   shapes the upstream URL
//! - Registration order is targets in file order, prefixes in lexicographic
//!   order, endpoints in list order; a later duplicate replaces an earlier one
//! - Immutable after construction

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::{Method, Uri};
use thiserror::Error;

use crate::config::validation::is_literal_path;
use crate::config::RoutesConfig;

/// One routable endpoint, bound to its upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Inbound path this route answers on.
    pub path: String,
    /// Fully resolved upstream URL.
    pub upstream: Uri,
    /// The only method accepted.
    pub method: Method,
    pub auth_required: bool,
    pub service: Arc<str>,
    pub description: String,
}

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("endpoint path {0:?} must start with '/' and contain no wildcard segments")]
    InvalidPath(String),

    #[error("endpoint {path:?}: invalid method {method:?}")]
    InvalidMethod { path: String, method: String },

    #[error("endpoint {path:?}: invalid upstream URL {url:?}: {source}")]
    InvalidUpstream {
        path: String,
        url: String,
        #[source]
        source: axum::http::uri::InvalidUri,
    },
}

/// Read-only mapping from inbound path to route.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: BTreeMap<String, Route>,
}

impl RouteTable {
    pub fn from_config(config: &RoutesConfig) -> Result<Self, RouteError> {
        let mut routes = BTreeMap::new();

        for target in &config.targets {
            let service: Arc<str> = Arc::from(target.service.as_str());
            let base = target.base_url.trim_end_matches('/');

            for (prefix, endpoints) in &target.endpoints {
                for endpoint in endpoints {
                    if !is_literal_path(&endpoint.path) {
                        return Err(RouteError::InvalidPath(endpoint.path.clone()));
                    }
                    let method = Method::from_bytes(endpoint.method.to_ascii_uppercase().as_bytes())
                        .map_err(|_| RouteError::InvalidMethod {
                            path: endpoint.path.clone(),
                            method: endpoint.method.clone(),
                        })?;

                    let url = format!("{base}{}", join_paths(prefix, &endpoint.path));
                    let upstream = url.parse::<Uri>().map_err(|source| RouteError::InvalidUpstream {
                        path: endpoint.path.clone(),
                        url: url.clone(),
                        source,
                    })?;

                    let route = Route {
                        path: endpoint.path.clone(),
                        upstream,
                        method,
                        auth_required: endpoint.token_required,
                        service: service.clone(),
                        description: endpoint.description.clone(),
                    };

                    tracing::debug!(
                        method = %route.method,
                        path = %route.path,
                        upstream = %route.upstream,
                        auth = route.auth_required,
                        "Route compiled"
                    );

                    if let Some(previous) = routes.insert(route.path.clone(), route) {
                        tracing::warn!(
                            path = %previous.path,
                            replaced = %previous.upstream,
                            "Duplicate route path, last registration wins"
                        );
                    }
                }
            }
        }

        Ok(Self { routes })
    }

    pub fn get(&self, path: &str) -> Option<&Route> {
        self.routes.get(path)
    }

    /// Routes in path order.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Join two URL paths and clean the result lexically.
///
/// Repeated slashes collapse, `.` segments vanish and `..` removes the
/// previous segment. The result is rooted and has no trailing slash unless
/// it is `/` itself.
pub fn join_paths(prefix: &str, path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in prefix.split('/').chain(path.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}
