//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all CiteGuard metrics
pub const METRICS_PREFIX: &str = "citeguard";

/// SLO-aligned histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00, 25.00,
];

/// Buckets for adapter / embedding latency (external calls, typically slower)
pub const EXTERNAL_BUCKETS: &[f64] = &[
    0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 4.000, 8.000, 10.00,
];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of similarity queries processed"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Similarity batch latency in seconds"
    );

    describe_counter!(
        format!("{}_adapter_calls_total", METRICS_PREFIX),
        Unit::Count,
        "External source adapter calls by source and outcome"
    );

    describe_histogram!(
        format!("{}_adapter_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "External source adapter latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding batches computed"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding batch latency in seconds"
    );

    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    describe_counter!(
        format!("{}_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Recoverable errors by kind"
    );

    describe_counter!(
        format!("{}_papers_added_total", METRICS_PREFIX),
        Unit::Count,
        "Papers added to the vector index"
    );

    describe_counter!(
        format!("{}_duplicates_skipped_total", METRICS_PREFIX),
        Unit::Count,
        "Papers skipped by the deduplicator"
    );

    describe_gauge!(
        format!("{}_index_size", METRICS_PREFIX),
        Unit::Count,
        "Papers currently held by the vector index"
    );

    describe_counter!(
        format!("{}_deadline_exceeded_total", METRICS_PREFIX),
        Unit::Count,
        "Batches that returned partial results on deadline expiry"
    );

    tracing::info!("Metrics registered");
}

/// Scope guard timing one handled request.
///
/// Records the request counter and latency histogram when dropped, so every
/// exit path of a handler is measured, early `?` returns included. Routes
/// are static names, not raw paths, to keep label cardinality bounded.
pub struct EndpointTimer {
    route: &'static str,
    begun: Instant,
}

impl EndpointTimer {
    pub fn new(route: &'static str) -> Self {
        Self {
            route,
            begun: Instant::now(),
        }
    }
}

impl Drop for EndpointTimer {
    fn drop(&mut self) {
        counter!(format!("{}_requests_total", METRICS_PREFIX), "route" => self.route)
            .increment(1);
        histogram!(format!("{}_request_duration_seconds", METRICS_PREFIX), "route" => self.route)
            .record(self.begun.elapsed().as_secs_f64());
    }
}

/// Record a completed similarity batch
pub fn record_search(duration_secs: f64, queries: usize, results: usize) {
    counter!(format!("{}_search_queries_total", METRICS_PREFIX)).increment(queries as u64);

    histogram!(format!("{}_search_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(format!("{}_search_results_last", METRICS_PREFIX)).set(results as f64);
}

/// Record an external adapter call
pub fn record_adapter_call(source: &str, ok: bool, duration_secs: f64) {
    let outcome = if ok { "ok" } else { "error" };

    counter!(
        format!("{}_adapter_calls_total", METRICS_PREFIX),
        "source" => source.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_adapter_duration_seconds", METRICS_PREFIX),
        "source" => source.to_string()
    )
    .record(duration_secs);
}

/// Record an embedding batch
pub fn record_embedding(duration_secs: f64, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(format!("{}_embedding_duration_seconds", METRICS_PREFIX))
            .record(duration_secs);
        gauge!(format!("{}_embedding_batch_last", METRICS_PREFIX)).set(batch_size as f64);
    }
}

/// Record a cache probe
pub fn record_cache(hit: bool, cache_name: &str) {
    let name = if hit {
        format!("{}_cache_hits_total", METRICS_PREFIX)
    } else {
        format!("{}_cache_misses_total", METRICS_PREFIX)
    };

    counter!(name, "cache" => cache_name.to_string()).increment(1);
}

/// Record a recoverable error by kind
pub fn record_error(kind: &'static str) {
    counter!(
        format!("{}_errors_total", METRICS_PREFIX),
        "kind" => kind
    )
    .increment(1);
}

/// Record index mutations
pub fn record_index_add(added: usize, skipped: usize, size: usize) {
    counter!(format!("{}_papers_added_total", METRICS_PREFIX)).increment(added as u64);
    counter!(format!("{}_duplicates_skipped_total", METRICS_PREFIX)).increment(skipped as u64);
    gauge!(format!("{}_index_size", METRICS_PREFIX)).set(size as f64);
}

/// Record a deadline expiry that produced partial results
pub fn record_deadline_exceeded() {
    counter!(format!("{}_deadline_exceeded_total", METRICS_PREFIX)).increment(1);
}
