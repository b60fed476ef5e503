//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define response-lifecycle metrics (failures by category, write latency)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `rest_response_request_completions_total` (counter): completed requests
//! - `rest_response_channel_write_latency_ms` (histogram): write latency
//! - `rest_response_*_errors_total` (counter): one per failure category
//!
//! # Design Decisions
//! - Handles are registered once per connection and cloned into each request
//! - Purely additive: nothing reads these values back to make decisions
//! - Without an installed recorder every handle is a no-op

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_histogram, histogram, Counter, Histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;

const REQUEST_COMPLETIONS: &str = "rest_response_request_completions_total";
const REQUEST_HANDLING_ERRORS: &str = "rest_response_request_handling_errors_total";
const RESPONSE_SENDING_ERRORS: &str = "rest_response_sending_errors_total";
const COMPLETE_TASKS_ERRORS: &str = "rest_response_complete_tasks_errors_total";
const DEAD_RESPONSE_ACCESS: &str = "rest_response_dead_response_access_errors_total";
const WRITE_AFTER_CLOSE: &str = "rest_response_write_after_close_errors_total";
const LOCK_INTERRUPTED: &str = "rest_response_lock_interrupted_errors_total";
const FLUSH_ERRORS: &str = "rest_response_flush_errors_total";
const BAD_REQUESTS: &str = "rest_response_bad_request_errors_total";
const INTERNAL_SERVER_ERRORS: &str = "rest_response_internal_server_errors_total";
const UNKNOWN_REST_SERVICE_ERRORS: &str = "rest_response_unknown_rest_service_errors_total";
const UNKNOWN_EXCEPTIONS: &str = "rest_response_unknown_exception_errors_total";
const WRITE_ERRORS: &str = "rest_response_channel_write_errors_total";
const WRITE_LATENCY: &str = "rest_response_channel_write_latency_ms";
const WRITE_ALREADY_TRACKED: &str = "rest_response_write_already_tracked_errors_total";
const WRITE_NOT_FOUND: &str = "rest_response_write_not_found_errors_total";

/// Metric handles used by the response layer.
#[derive(Clone)]
pub struct ResponseMetrics {
    pub request_completions: Counter,
    pub request_handling_errors: Counter,
    pub response_sending_errors: Counter,
    pub complete_tasks_errors: Counter,

    pub dead_response_access_errors: Counter,
    pub write_after_close_errors: Counter,
    pub metadata_lock_interrupted: Counter,
    pub write_lock_interrupted: Counter,
    pub close_lock_interrupted: Counter,
    pub flush_errors: Counter,

    pub bad_request_errors: Counter,
    pub internal_server_errors: Counter,
    pub unknown_rest_service_errors: Counter,
    pub unknown_exception_errors: Counter,

    pub channel_write_errors: Counter,
    pub channel_write_latency_ms: Histogram,
    pub write_already_tracked_errors: Counter,
    pub write_not_found_errors: Counter,
}

impl ResponseMetrics {
    /// Register every handle against the current recorder.
    pub fn register() -> Self {
        Self {
            request_completions: counter!(REQUEST_COMPLETIONS),
            request_handling_errors: counter!(REQUEST_HANDLING_ERRORS),
            response_sending_errors: counter!(RESPONSE_SENDING_ERRORS),
            complete_tasks_errors: counter!(COMPLETE_TASKS_ERRORS),

            dead_response_access_errors: counter!(DEAD_RESPONSE_ACCESS),
            write_after_close_errors: counter!(WRITE_AFTER_CLOSE),
            metadata_lock_interrupted: counter!(LOCK_INTERRUPTED, "lock" => "metadata"),
            write_lock_interrupted: counter!(LOCK_INTERRUPTED, "lock" => "write"),
            close_lock_interrupted: counter!(LOCK_INTERRUPTED, "lock" => "close"),
            flush_errors: counter!(FLUSH_ERRORS),

            bad_request_errors: counter!(BAD_REQUESTS),
            internal_server_errors: counter!(INTERNAL_SERVER_ERRORS),
            unknown_rest_service_errors: counter!(UNKNOWN_REST_SERVICE_ERRORS),
            unknown_exception_errors: counter!(UNKNOWN_EXCEPTIONS),

            channel_write_errors: counter!(WRITE_ERRORS),
            channel_write_latency_ms: histogram!(WRITE_LATENCY),
            write_already_tracked_errors: counter!(WRITE_ALREADY_TRACKED),
            write_not_found_errors: counter!(WRITE_NOT_FOUND),
        }
    }
}

impl Default for ResponseMetrics {
    fn default() -> Self {
        Self::register()
    }
}

/// Attach descriptions for exporters that surface them.
pub fn describe_metrics() {
    describe_counter!(REQUEST_COMPLETIONS, "Requests whose response lifecycle was completed");
    describe_counter!(REQUEST_HANDLING_ERRORS, "Requests completed with an upstream failure");
    describe_counter!(RESPONSE_SENDING_ERRORS, "Error responses that could not be sent");
    describe_counter!(COMPLETE_TASKS_ERRORS, "Failures swallowed while completing a request");
    describe_counter!(DEAD_RESPONSE_ACCESS, "Metadata changes attempted after it was sent");
    describe_counter!(WRITE_AFTER_CLOSE, "Writes attempted on a closed channel");
    describe_counter!(LOCK_INTERRUPTED, "Internal lock acquisitions that timed out");
    describe_counter!(FLUSH_ERRORS, "Advisory flushes that failed");
    describe_counter!(BAD_REQUESTS, "Error responses mapped to 400");
    describe_counter!(INTERNAL_SERVER_ERRORS, "Error responses mapped to 500");
    describe_counter!(UNKNOWN_REST_SERVICE_ERRORS, "Service errors with an unmapped code");
    describe_counter!(UNKNOWN_EXCEPTIONS, "Failures of an unrecognised type");
    describe_counter!(WRITE_ERRORS, "Transport writes that failed");
    describe_histogram!(WRITE_LATENCY, Unit::Milliseconds, "Transport write latency");
    describe_counter!(WRITE_ALREADY_TRACKED, "Duplicate write tracking requests");
    describe_counter!(WRITE_NOT_FOUND, "Completions for writes that were not tracked");
}

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;

    #[test]
    fn test_handles_record_into_local_recorder() {
        let (metrics, snapshotter) = recorded();
        metrics.request_completions.increment(2);
        metrics.write_lock_interrupted.increment(1);
        metrics.close_lock_interrupted.increment(1);
        metrics.channel_write_latency_ms.record(3.0);

        let snapshot = MetricsSnapshot::take(&snapshotter);
        assert_eq!(snapshot.counter("rest_response_request_completions_total"), 2);
        assert_eq!(snapshot.counter("rest_response_lock_interrupted_errors_total"), 2);
        assert_eq!(
            snapshot.labeled_counter("rest_response_lock_interrupted_errors_total", "lock", "close"),
            1
        );
        assert_eq!(snapshot.histogram_samples("rest_response_channel_write_latency_ms"), 1);
        assert_eq!(snapshot.counter("rest_response_flush_errors_total"), 0);
    }
}
