//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bridge_responses_total` (counter): responses served, by status
//! - `bridge_handler_completions_total` (counter): handler outcomes (`ok`, `error`)
//! - `bridge_body_bytes_total` (counter): body bytes consumed by readers
//!
//! # Design Decisions
//! - Recording without an installed recorder is a no-op
//! - Prometheus exporter only when enabled in config

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_bridged_response(status: u16) {
    metrics::counter!("bridge_responses_total", "status" => status.to_string()).increment(1);
}

pub fn record_handler_completion(outcome: &'static str) {
    metrics::counter!("bridge_handler_completions_total", "outcome" => outcome).increment(1);
}

pub fn record_body_bytes(bytes: usize) {
    if bytes > 0 {
        metrics::counter!("bridge_body_bytes_total").increment(bytes as u64);
    }
}
