//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): dispatched requests by status
//! - `dispatch_request_duration_seconds` (histogram): dispatch latency
//! - `dispatch_rule_matches_total` (counter): global rule hits by rule
//! - `dispatch_config_reloads_total` (counter): reloads by outcome
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Labels are bounded: status codes and configured rule strings only

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished dispatch. `status` is 0 when output was suppressed.
pub fn record_dispatch(status: u16, start: Instant) {
    counter!("dispatch_requests_total", "status" => status.to_string()).increment(1);
    histogram!("dispatch_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rule_match(rule: &str) {
    counter!("dispatch_rule_matches_total", "rule" => rule.to_string()).increment(1);
}

pub fn record_reload(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("dispatch_config_reloads_total", "outcome" => outcome).increment(1);
}
