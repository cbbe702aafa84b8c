//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_retries_total` (counter): retry attempts after the first
//! - `gateway_rate_limited_total` (counter): admissions aborted while waiting
//! - `gateway_auth_rejections_total` (counter): token failures by reason
//! - `gateway_audit_dropped_total` (counter): audit records discarded by reason
//! - `gateway_audit_store_failures_total` (counter): failed or timed-out store calls
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - The Prometheus exporter is optional and owns its own listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and start its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished request as seen by the caller.
pub fn record_request(route: &str, method: &str, status: u16, start: Instant) {
    let labels = [
        ("route", route.to_string()),
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("gateway_requests_total", &labels).increment(1);
    histogram!("gateway_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_retry() {
    counter!("gateway_retries_total").increment(1);
}

pub fn record_rate_limited(reason: &str) {
    counter!("gateway_rate_limited_total", "reason" => reason.to_string()).increment(1);
}

pub fn record_auth_rejected(reason: &'static str) {
    counter!("gateway_auth_rejections_total", "reason" => reason).increment(1);
}

pub fn record_audit_dropped(reason: &'static str) {
    counter!("gateway_audit_dropped_total", "reason" => reason).increment(1);
}

pub fn record_audit_store_failure() {
    counter!("gateway_audit_store_failures_total").increment(1);
}
