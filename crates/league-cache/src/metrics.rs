//! Cache metrics.
//!
//! Recorded through the `metrics` facade; they are no-ops until the host
//! application installs a recorder (e.g. a Prometheus exporter).

use metrics::{counter, gauge};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_ENTRIES: &str = "cache_entries";
    pub const CACHE_LOADER_CALLS_TOTAL: &str = "cache_loader_calls_total";
    pub const CACHE_VERSION_BUMPS_TOTAL: &str = "cache_version_bumps_total";
    pub const CACHE_REMOTE_ERRORS_TOTAL: &str = "cache_remote_errors_total";
    pub const CACHE_INVALIDATIONS_PUBLISHED_TOTAL: &str = "cache_invalidations_published_total";
    pub const CACHE_INVALIDATIONS_RECEIVED_TOTAL: &str = "cache_invalidations_received_total";
}

/// Record a cache hit.
pub fn record_cache_hit(tier: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier).increment(1);
}

/// Record a cache miss.
pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

pub fn record_loader_call() {
    counter!(names::CACHE_LOADER_CALLS_TOTAL).increment(1);
}

pub fn record_version_bump() {
    counter!(names::CACHE_VERSION_BUMPS_TOTAL).increment(1);
}

/// Record a swallowed remote failure.
pub fn record_remote_error(op: &'static str) {
    counter!(names::CACHE_REMOTE_ERRORS_TOTAL, "op" => op).increment(1);
}

pub fn record_invalidation_published() {
    counter!(names::CACHE_INVALIDATIONS_PUBLISHED_TOTAL).increment(1);
}

pub fn record_invalidation_received() {
    counter!(names::CACHE_INVALIDATIONS_RECEIVED_TOTAL).increment(1);
}

/// Set the number of local cache entries.
pub fn set_local_entries(count: usize) {
    gauge!(names::CACHE_ENTRIES, "tier" => "local").set(count as f64);
}
