//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): data-plane requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): data-plane latency
//! - `gateway_route_writes_total` (counter): admin writes by op and outcome
//! - `gateway_store_revision` (gauge): latest store revision
//! - `gateway_worker_revision` (gauge): last revision applied per worker
//! - `gateway_script_compile_failures_total` (counter): per route
//! - `gateway_script_executions_total` (counter): by phase and outcome
//! - `gateway_script_duration_seconds` (histogram): per phase hook
//!
//! Without an installed recorder every call is a no-op, so tests and
//! embedders need no setup.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    ::metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_route_write(op: &'static str, outcome: &'static str) {
    ::metrics::counter!("gateway_route_writes_total", "op" => op, "outcome" => outcome).increment(1);
}

pub fn record_store_revision(revision: u64) {
    ::metrics::gauge!("gateway_store_revision").set(revision as f64);
}

pub fn record_worker_revision(worker: usize, revision: u64) {
    ::metrics::gauge!("gateway_worker_revision", "worker" => worker.to_string()).set(revision as f64);
}

pub fn record_compile_failure(route: &str) {
    ::metrics::counter!("gateway_script_compile_failures_total", "route" => route.to_string()).increment(1);
}

pub fn record_script_execution(phase: &'static str, outcome: &'static str, elapsed: Duration) {
    ::metrics::counter!("gateway_script_executions_total", "phase" => phase, "outcome" => outcome)
        .increment(1);
    ::metrics::histogram!("gateway_script_duration_seconds", "phase" => phase)
        .record(elapsed.as_secs_f64());
}
