//! Streaming response capture.
//!
//! Wraps an upstream response body so the gateway can stream it to the
//! caller untouched while keeping a bounded copy for the audit record. The
//! record is submitted exactly once: when the body ends, when it fails, or
//! when it is dropped early.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::StatusCode;
use bytes::{Bytes, BytesMut};
use hyper::body::{Body as HttpBody, Frame, SizeHint};

use crate::audit::dump::write_body;
use crate::audit::logger::AuditLogger;
use crate::audit::record::RecordDraft;

/// Record under construction, waiting for the body to finish.
struct PendingRecord {
    logger: Arc<AuditLogger>,
    draft: RecordDraft,
    status: StatusCode,
    head: String,
}

/// A response body that tees into an audit record.
pub struct AuditedBody {
    inner: Body,
    captured: BytesMut,
    total: usize,
    limit: usize,
    pending: Option<PendingRecord>,
}

impl AuditedBody {
    pub fn new(
        inner: Body,
        logger: Arc<AuditLogger>,
        draft: RecordDraft,
        status: StatusCode,
        head: String,
        limit: usize,
    ) -> Self {
        Self {
            inner,
            captured: BytesMut::new(),
            total: 0,
            limit,
            pending: Some(PendingRecord {
                logger,
                draft,
                status,
                head,
            }),
        }
    }

    fn capture(&mut self, data: &Bytes) {
        self.total += data.len();
        let room = self.limit.saturating_sub(self.captured.len());
        self.captured.extend_from_slice(&data[..data.len().min(room)]);
    }

    fn finish(&mut self, error: Option<String>) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        let mut response = pending.head;
        write_body(&mut response, &self.captured, self.limit);
        if self.total > self.captured.len() {
            response.push_str(&format!("\r\n[{} bytes truncated]", self.total - self.captured.len()));
        }

        let record = pending.draft.completed(pending.status, response, error);
        pending.logger.submit(record);
    }
}

impl HttpBody for AuditedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                if let Some(data) = frame.data_ref() {
                    this.capture(data);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finish(Some(format!("response body error: {e}")));
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finish(None);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for AuditedBody {
    fn drop(&mut self) {
        if self.pending.is_some() {
            let error = (!self.inner.is_end_stream())
                .then(|| "response body not fully delivered".to_string());
            self.finish(error);
        }
    }
}
