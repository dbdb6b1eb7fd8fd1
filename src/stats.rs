//! Statistics tracking for the DNS daemon.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::cache::CacheStats;

/// Atomic query counters owned by one server instance.
///
/// Counters only grow; cache hits and misses live in the cache and are
/// merged in by [`Stats::snapshot`].
pub struct Stats {
    queries_total: AtomicU64,
    queries_matched: AtomicU64,
    queries_forwarded: AtomicU64,
    errors: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            queries_total: AtomicU64::new(0),
            queries_matched: AtomicU64::new(0),
            queries_forwarded: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn record_query(&self) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_matched(&self) {
        self.queries_matched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.queries_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, cache: &CacheStats) -> DaemonStats {
        DaemonStats {
            queries_total: self.queries_total.load(Ordering::Relaxed),
            queries_matched: self.queries_matched.load(Ordering::Relaxed),
            queries_forwarded: self.queries_forwarded.load(Ordering::Relaxed),
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the daemon counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonStats {
    pub queries_total: u64,
    pub queries_matched: u64,
    pub queries_forwarded: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors: u64,
}
