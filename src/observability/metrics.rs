//! Metrics collection and exposition.
//!
//! # Metrics
//! - `plugin_rpc_requests_total` (counter): calls by method and status
//! - `plugin_rpc_request_duration_seconds` (histogram): call latency by method
//! - `plugin_active_connections` (gauge): connections being served
//! - `plugin_shutdown_tasks_total` (counter): shutdown tasks by status

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: &'static str, start: Instant) {
    counter!("plugin_rpc_requests_total", "method" => method.to_string(), "status" => status)
        .increment(1);
    histogram!("plugin_rpc_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn set_active_connections(count: u64) {
    gauge!("plugin_active_connections").set(count as f64);
}

pub fn record_shutdown_task(status: &'static str) {
    counter!("plugin_shutdown_tasks_total", "status" => status).increment(1);
}
