//! Telemetry - scoring aggregates and HTTP instrumentation
//!
//! The scoring aggregates live in an injectable [`MetricsStore`] backed by
//! its own prometheus registry. Per-request counters, latencies and sizes go
//! through the `metrics` facade and are rendered by the Prometheus exporter.

pub mod store;

use metrics::Unit;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

pub use store::{MetricsStore, RollingWindow};

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION: &str = "http_request_duration_seconds";
pub const HTTP_REQUEST_DURATION_HIGHR: &str = "http_request_duration_highr_seconds";
pub const HTTP_REQUEST_SIZE: &str = "http_request_size_bytes";
pub const HTTP_RESPONSE_SIZE: &str = "http_response_size_bytes";

const LATENCY_BUCKETS: [f64; 3] = [0.1, 0.5, 1.0];

const LATENCY_HIGHR_BUCKETS: [f64; 21] = [
    0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0, 4.5, 5.0,
    7.5, 10.0, 30.0, 60.0,
];

// Size metrics get no buckets and render as summaries.
pub(crate) fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION.to_string()),
            &LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION_HIGHR.to_string()),
            &LATENCY_HIGHR_BUCKETS,
        )
}

/// Install the process-wide recorder for request instrumentation
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = builder()?.install_recorder()?;

    metrics::describe_counter!(
        HTTP_REQUESTS_TOTAL,
        "Total number of requests by method, status and handler."
    );
    metrics::describe_histogram!(
        HTTP_REQUEST_DURATION,
        Unit::Seconds,
        "Latency with only few buckets by handler."
    );
    metrics::describe_histogram!(
        HTTP_REQUEST_DURATION_HIGHR,
        Unit::Seconds,
        "Latency with many buckets but no labels."
    );
    metrics::describe_histogram!(
        HTTP_REQUEST_SIZE,
        Unit::Bytes,
        "Content length of incoming requests by handler."
    );
    metrics::describe_histogram!(
        HTTP_RESPONSE_SIZE,
        Unit::Bytes,
        "Content length of outgoing responses by handler."
    );

    Ok(handle)
}

/// Handle backed by a recorder that is not installed globally
pub fn detached_handle() -> Result<PrometheusHandle, BuildError> {
    Ok(builder()?.build_recorder().handle())
}
