//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): executed requests by method, status
//! - `gateway_request_duration_seconds` (histogram): execute + write latency
//! - `gateway_active_connections` (gauge): open client connections
//! - `gateway_upload_chunks_total` (counter): accepted chunks by outcome
//! - `gateway_upstream_attempts_total` (counter): upstream attempts by outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &'static str, status: u16, start: Instant) {
    counter!("gateway_requests_total", "method" => method, "status" => status.to_string())
        .increment(1);
    histogram!("gateway_request_duration_seconds", "method" => method)
        .record(start.elapsed().as_secs_f64());
}

pub fn connection_opened() {
    gauge!("gateway_active_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("gateway_active_connections").decrement(1.0);
}

pub fn record_upload_chunk(outcome: &'static str) {
    counter!("gateway_upload_chunks_total", "outcome" => outcome).increment(1);
}

pub fn record_upstream_attempt(outcome: &'static str) {
    counter!("gateway_upstream_attempts_total", "outcome" => outcome).increment(1);
}
