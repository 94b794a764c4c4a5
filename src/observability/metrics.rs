//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): rejections by window
//! - `gateway_cache_lookups_total` (counter): lookups by result
//! - `gateway_cache_entries` (gauge): cached answers
//! - `gateway_cache_evictions_total` (counter): LRU evictions
//! - `gateway_cache_invalidations_total` (counter): entries dropped by tenant invalidation
//! - `gateway_limiter_tracked_keys` (gauge): distinct rate-limit keys
//! - `gateway_answer_errors_total` (counter): failed collaborator calls
//!
//! Recording goes through the `metrics` facade, so every call is a no-op
//! until `init_metrics` installs the Prometheus recorder.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(window: &'static str) {
    metrics::counter!("gateway_rate_limited_total", "window" => window).increment(1);
}

pub fn record_cache_lookup(result: &'static str) {
    metrics::counter!("gateway_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_size(entries: usize) {
    metrics::gauge!("gateway_cache_entries").set(entries as f64);
}

pub fn record_cache_eviction() {
    metrics::counter!("gateway_cache_evictions_total").increment(1);
}

pub fn record_cache_invalidation(removed: usize) {
    metrics::counter!("gateway_cache_invalidations_total").increment(removed as u64);
}

pub fn record_limiter_keys(keys: usize) {
    metrics::gauge!("gateway_limiter_tracked_keys").set(keys as f64);
}

pub fn record_answer_error(kind: &'static str) {
    metrics::counter!("gateway_answer_errors_total", "kind" => kind).increment(1);
}
