//! Metrics collection and exposition.
//!
//! # Metrics
//! - `function_invocations_total` (counter): invocations by outcome
//! - `function_invocation_duration_seconds` (histogram): dispatch latency
//! - `function_resource_releases_total` (counter): release attempts by path and result
//! - `function_shutdowns_total` (counter): teardowns by trigger
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library code and
//!   tests can call these freely
//! - Prometheus exporter serves its own HTTP listener

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resource::ResourceError;

/// Install the Prometheus recorder and HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one dispatched invocation.
pub fn record_invocation(outcome: &'static str, elapsed: Duration) {
    counter!("function_invocations_total", "outcome" => outcome).increment(1);
    histogram!("function_invocation_duration_seconds").record(elapsed.as_secs_f64());
}

/// Record a release attempt on the shared resource.
pub fn record_resource_release(path: &'static str, result: &Result<(), ResourceError>) {
    let result = match result {
        Ok(()) => "released",
        Err(e) if e.is_already_closed() => "already_closed",
        Err(_) => "failed",
    };
    counter!("function_resource_releases_total", "path" => path, "result" => result).increment(1);
}

/// Record a teardown and what triggered it.
pub fn record_shutdown(trigger: &'static str) {
    counter!("function_shutdowns_total", "trigger" => trigger).increment(1);
}
