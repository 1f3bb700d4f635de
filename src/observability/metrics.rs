//! Metrics collection and exposition.
//!
//! # Metrics
//! - `faas_gateway_requests_total` (counter): requests by trigger kind, status
//! - `faas_gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `faas_workers_connected` (gauge): registered workers
//! - `faas_protocol_violations_total` (counter): workers torn down for
//!   protocol violations

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(kind: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "faas_gateway_requests_total",
        "kind" => kind,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("faas_gateway_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn set_workers_connected(count: usize) {
    metrics::gauge!("faas_workers_connected").set(count as f64);
}

pub fn record_protocol_violation() {
    metrics::counter!("faas_protocol_violations_total").increment(1);
}
