//! Prometheus metrics for store latency and API errors.
//!
//! This module provides:
//! - Store operation latency and outcome counters
//! - API error counters by kind
//! - Installation of the Prometheus recorder backing `/metrics`

use std::future::Future;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::debug;

// === Metric Name Constants ===

/// Store operation latency metric name.
pub const METRIC_STORE_LATENCY: &str = "store_operation_latency_ms";
/// Store operations counter metric name.
pub const METRIC_STORE_OPERATIONS: &str = "store_operations_total";
/// API errors counter metric name.
pub const METRIC_API_ERRORS: &str = "api_errors_total";

/// Initialize all metric descriptions.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_STORE_LATENCY,
        "Budget store operation latency in milliseconds"
    );
    describe_counter!(
        METRIC_STORE_OPERATIONS,
        "Total number of budget store operations by outcome"
    );
    describe_counter!(
        METRIC_API_ERRORS,
        "Total number of error responses by kind"
    );

    debug!("Metrics initialized");
}

/// Install the global Prometheus recorder and describe metrics.
///
/// Only one recorder can be installed per process.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    init_metrics();
    Ok(handle)
}

/// Increment the API error counter.
pub fn inc_api_errors(kind: &'static str) {
    counter!(METRIC_API_ERRORS, "kind" => kind).increment(1);
}

/// RAII guard for timing store operations.
/// Records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    operation: &'static str,
}

impl LatencyTimer {
    /// Start timing `operation`.
    pub fn new(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(METRIC_STORE_LATENCY, "operation" => self.operation).record(self.elapsed_ms());
    }
}

/// Await a store call, recording its latency and outcome.
pub async fn track_store<T, E>(
    operation: &'static str,
    call: impl Future<Output = Result<T, E>>,
) -> Result<T, E> {
    let _timer = LatencyTimer::new(operation);
    let result = call.await;
    let outcome = if result.is_ok() { "ok" } else { "error" };
    counter!(METRIC_STORE_OPERATIONS, "operation" => operation, "outcome" => outcome).increment(1);
    result
}
