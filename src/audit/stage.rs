//! Audit logging pipeline stage.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Response;
use futures_util::future::BoxFuture;

use crate::audit::capture::AuditedBody;
use crate::audit::dump::{dump_request, dump_response_head};
use crate::audit::logger::AuditLogger;
use crate::audit::record::RecordDraft;
use crate::transport::{OutboundRequest, Transport, TransportResult};

/// Records every exchange that reaches it, then passes the outcome upward.
///
/// Errors are returned marked as recorded so the proxy handler does not log
/// them a second time.
pub struct LoggingStage<T> {
    next: T,
    logger: Arc<AuditLogger>,
    capture_limit: usize,
}

impl<T> LoggingStage<T> {
    pub fn new(next: T, logger: Arc<AuditLogger>, capture_limit: usize) -> Self {
        Self {
            next,
            logger,
            capture_limit,
        }
    }
}

impl<T: Transport> Transport for LoggingStage<T> {
    fn execute(&self, request: OutboundRequest) -> BoxFuture<'_, TransportResult> {
        Box::pin(async move {
            let snapshot = dump_request(
                &request.method,
                &request.uri,
                &request.headers,
                Some(request.body.as_ref()),
                self.capture_limit,
            );
            let draft = RecordDraft::new(
                &request.meta,
                request.method.clone(),
                request.uri.to_string(),
                snapshot,
            );

            match self.next.execute(request).await {
                Ok(response) => {
                    let (parts, body) = response.into_parts();
                    let head = dump_response_head(parts.version, parts.status, &parts.headers);
                    let body = AuditedBody::new(
                        body,
                        self.logger.clone(),
                        draft,
                        parts.status,
                        head,
                        self.capture_limit,
                    );
                    Ok(Response::from_parts(parts, Body::new(body)))
                }
                Err(err) => {
                    self.logger.submit(draft.failed(None, err.to_string()));
                    Err(err.recorded())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::store::MemoryStore;
    use crate::config::AuditConfig;
    use crate::transport::{RequestMeta, TransportError};
    use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};

    struct Fixed(Option<StatusCode>);

    impl Transport for Fixed {
        fn execute(&self, _request: OutboundRequest) -> BoxFuture<'_, TransportResult> {
            Box::pin(async move {
                match self.0 {
                    Some(status) => Ok(Response::builder()
                        .status(status)
                        .header("x-upstream", "yes")
                        .body(Body::from("payload"))
                        .unwrap()),
                    None => Err(TransportError::upstream("connection reset")),
                }
            })
        }
    }

    fn request() -> OutboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace", HeaderValue::from_static("t1"));
        OutboundRequest::new(Method::POST, Uri::from_static("http://up.example/api/items"))
            .with_headers(headers)
            .with_body("hello")
            .with_meta(RequestMeta {
                service: Arc::from("items"),
                client_addr: Some("127.0.0.1:9000".parse().unwrap()),
                request_id: None,
            })
    }

    #[tokio::test]
    async fn test_success_records_response_and_passes_it_through() {
        let store = Arc::new(MemoryStore::new());
        let logger = AuditLogger::spawn(store.clone(), &AuditConfig::default());
        let stage = LoggingStage::new(Fixed(Some(StatusCode::CREATED)), logger.clone(), 1024);

        let response = stage.execute(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["x-upstream"], "yes");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"payload");

        logger.close().await;
        let records = store.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert!(record.success);
        assert_eq!(record.status, Some(201));
        assert_eq!(record.service, "items");
        assert_eq!(record.endpoint, "http://up.example/api/items");
        assert_eq!(record.client_address, "127.0.0.1:9000");
        assert!(record.request.starts_with("POST /api/items HTTP/1.1\r\n"));
        assert!(record.request.ends_with("hello"));
        assert!(record.response.contains("x-upstream: yes"));
        assert!(record.response.ends_with("payload"));
    }

    #[tokio::test]
    async fn test_error_is_recorded_and_propagated() {
        let store = Arc::new(MemoryStore::new());
        let logger = AuditLogger::spawn(store.clone(), &AuditConfig::default());
        let stage = LoggingStage::new(Fixed(None), logger.clone(), 1024);

        let err = stage.execute(request()).await.unwrap_err();
        assert!(err.is_recorded());
        assert!(matches!(err.kind(), TransportError::Upstream(_)));

        logger.close().await;
        let records = store.records();
        assert_eq!(records.len(), 1);
        assert!(!records[0].success);
        assert_eq!(records[0].status, None);
        assert!(records[0].response.is_empty());
        assert_eq!(records[0].error, "upstream request failed: connection reset");
    }
}
