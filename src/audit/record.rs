//! Audit record model.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transport::RequestMeta;

/// One proxied request's inputs, outputs and outcome. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    #[serde(rename = "time")]
    pub timestamp: DateTime<Utc>,
    pub service: String,
    /// Upstream URL the request was (or would have been) sent to.
    pub endpoint: String,
    pub method: String,
    #[serde(rename = "user_ip")]
    pub client_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub success: bool,
    /// Status seen by whoever produced the record; `None` when no response exists.
    pub status: Option<u16>,
    pub request: String,
    pub response: String,
    pub error: String,
}

/// Everything known about a request before its outcome.
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub service: Arc<str>,
    pub endpoint: String,
    pub method: Method,
    pub client_addr: Option<SocketAddr>,
    pub request_id: Option<String>,
    pub request: String,
}

impl RecordDraft {
    pub fn new(meta: &RequestMeta, method: Method, endpoint: impl Into<String>, request: String) -> Self {
        Self {
            service: meta.service.clone(),
            endpoint: endpoint.into(),
            method,
            client_addr: meta.client_addr,
            request_id: meta.request_id.clone(),
            request,
        }
    }

    fn finish(self, status: Option<StatusCode>, response: String, error: String, success: bool) -> AuditRecord {
        AuditRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            service: self.service.to_string(),
            endpoint: self.endpoint,
            method: self.method.to_string(),
            client_address: self
                .client_addr
                .map(|addr| addr.to_string())
                .unwrap_or_default(),
            request_id: self.request_id,
            success,
            status: status.map(|s| s.as_u16()),
            request: self.request,
            response,
            error,
        }
    }

    /// An exchange that produced a response; success follows the status.
    pub fn completed(self, status: StatusCode, response: String, error: Option<String>) -> AuditRecord {
        let success = error.is_none() && is_success_status(status);
        self.finish(Some(status), response, error.unwrap_or_default(), success)
    }

    /// An exchange that ended in an error, with the status returned to the caller if any.
    pub fn failed(self, status: Option<StatusCode>, error: impl Into<String>) -> AuditRecord {
        self.finish(status, String::new(), error.into(), false)
    }
}

/// Informational, success and redirect statuses count as success.
pub fn is_success_status(status: StatusCode) -> bool {
    status.as_u16() < 400
}
