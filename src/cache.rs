//! DNS response cache with TTL-based expiration.

use hickory_proto::rr::RecordType;
use rustc_hash::FxHashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

struct CacheEntry {
    response: Vec<u8>,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.inserted_at) > self.ttl
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    /// `hits / (hits + misses)`, or 0 before the first lookup.
    pub hit_rate: f64,
}

/// TTL-based DNS response cache.
///
/// Uses a 2-level map (qtype -> name -> entry) to avoid allocations on lookup.
/// There is no capacity bound: entries leave only when they expire or the
/// cache is cleared.
pub struct ResponseCache {
    entries: RwLock<FxHashMap<u16, FxHashMap<String, CacheEntry>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a cached response, evicting it if it has expired.
    pub fn get(&self, name: &str, qtype: RecordType) -> Option<Vec<u8>> {
        self.get_at(name, qtype, Instant::now())
    }

    fn get_at(&self, name: &str, qtype: RecordType, now: Instant) -> Option<Vec<u8>> {
        let qtype = u16::from(qtype);

        {
            let Ok(entries) = self.entries.read() else {
                return self.miss();
            };
            match entries.get(&qtype).and_then(|inner| inner.get(name)) {
                None => return self.miss(),
                Some(entry) if !entry.is_expired(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.response.clone());
                }
                Some(_) => {}
            }
        }

        if let Ok(mut entries) = self.entries.write() {
            if let Some(inner) = entries.get_mut(&qtype) {
                // Another task may have refreshed the entry in between.
                if inner.get(name).is_some_and(|entry| entry.is_expired(now)) {
                    inner.remove(name);
                }
            }
        }
        self.miss()
    }

    fn miss(&self) -> Option<Vec<u8>> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a response, replacing any previous entry for the same key.
    pub fn set(&self, name: &str, qtype: RecordType, response: Vec<u8>, ttl_secs: u32) {
        let Ok(mut entries) = self.entries.write() else {
            return;
        };

        let inner = entries.entry(u16::from(qtype)).or_default();
        inner.insert(
            name.to_string(),
            CacheEntry {
                response,
                inserted_at: Instant::now(),
                ttl: Duration::from_secs(u64::from(ttl_secs)),
            },
        );
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    fn cleanup_at(&self, now: Instant) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };

        let mut removed = 0;
        for inner in entries.values_mut() {
            let before = inner.len();
            inner.retain(|_, entry| !entry.is_expired(now));
            removed += before - inner.len();
        }
        entries.retain(|_, inner| !inner.is_empty());
        removed
    }

    /// Remove all entries and reset the hit/miss counters.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        CacheStats {
            hits,
            misses,
            size: self.len(),
            hit_rate: if lookups > 0 {
                hits as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|e| e.values().map(|inner| inner.len()).sum())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}
