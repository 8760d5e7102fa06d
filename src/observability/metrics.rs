//! Metrics collection and exposition.
//!
//! # Metrics
//! - `reconciler_reloads_total` (counter): reconciliation passes by `outcome` (`ok`, `error`)
//! - `reconciler_endpoints_started_total` (counter): bindings handed out to start
//! - `reconciler_endpoints_stopped_total` (counter): bindings handed out to stop
//! - `reconciler_bound_endpoints` (gauge): bindings held after the last successful pass
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is opt-in from the binary

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter serving scrapes on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a successful pass.
pub fn record_reload(started: usize, stopped: usize, bound: usize) {
    metrics::counter!("reconciler_reloads_total", "outcome" => "ok").increment(1);
    metrics::counter!("reconciler_endpoints_started_total").increment(started as u64);
    metrics::counter!("reconciler_endpoints_stopped_total").increment(stopped as u64);
    metrics::gauge!("reconciler_bound_endpoints").set(bound as f64);
}

/// Record a pass aborted by an error.
pub fn record_reload_failure() {
    metrics::counter!("reconciler_reloads_total", "outcome" => "error").increment(1);
}
