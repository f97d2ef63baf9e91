//! Metrics collection and exposition.
//!
//! # Metrics
//! - `taskserver_connections_total` (counter): connections accepted
//! - `taskserver_active_connections` (gauge): connections currently served
//! - `taskserver_rate_limited_total` (counter): connections dropped at admission
//! - `taskserver_parse_errors_total` (counter): malformed requests
//! - `taskserver_tasks_total` (counter): executed tasks by outcome
//! - `taskserver_task_duration_seconds` (histogram): execution latency
//!
//! Recording is a no-op until an exporter is installed, so the server runs
//! identically with metrics disabled.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and serve scrapes on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full("taskserver_task_duration_seconds".to_string()),
            &[0.005, 0.025, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0],
        )
        .expect("bucket list is non-empty");

    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a connection entering service.
pub fn record_connection_opened() {
    counter!("taskserver_connections_total").increment(1);
    gauge!("taskserver_active_connections").increment(1.0);
}

/// Record a connection leaving service.
pub fn record_connection_closed() {
    gauge!("taskserver_active_connections").decrement(1.0);
}

/// Record a connection dropped at admission.
pub fn record_rate_limited() {
    counter!("taskserver_rate_limited_total").increment(1);
}

/// Record a request that failed to decode.
pub fn record_parse_error() {
    counter!("taskserver_parse_errors_total").increment(1);
}

/// Record one executed task with its outcome label and duration.
pub fn record_task(outcome: &str, duration_secs: f64) {
    counter!("taskserver_tasks_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("taskserver_task_duration_seconds").record(duration_secs);
}
