//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): finished exchanges by method, status
//! - `http_request_duration_seconds` (histogram): time to response head
//! - `access_log_write_failures_total` (counter): failed appends by sink
//! - `access_log_rotations_total` (counter): truncations by sink
//! - `rate_limited_total` (counter): rejected requests by limiter
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus
//! recorder, so handlers and tests can call these freely.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and start its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, elapsed: Duration) {
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("http_request_duration_seconds", "method" => method.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_log_write_failure(sink: &str) {
    counter!("access_log_write_failures_total", "sink" => sink.to_string()).increment(1);
}

pub fn record_log_rotation(sink: &str) {
    counter!("access_log_rotations_total", "sink" => sink.to_string()).increment(1);
}

pub fn record_rate_limited(limiter: &str) {
    counter!("rate_limited_total", "limiter" => limiter.to_string()).increment(1);
}
