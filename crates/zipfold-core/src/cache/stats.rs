//! Lock-free counters for cache activity.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Statistics for one [`LruCache`](super::LruCache).
///
/// Tracks hits, misses, residency and evictions for computing cache
/// efficiency. All operations are lock-free using atomic counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    entries: AtomicU64,
    evictions: AtomicU64,
    bytes: AtomicU64,
    rejected: AtomicU64,
}

impl CacheStats {
    /// Create new cache statistics.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an entry of `size` units being added.
    #[inline]
    pub fn record_insert(&self, size: u64) {
        self.entries.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(size, Ordering::Relaxed);
    }

    /// Record an entry of `size` units being evicted or compacted away.
    #[inline]
    pub fn record_eviction(&self, size: u64) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.record_remove(size);
    }

    /// Record an entry leaving the cache without counting as an eviction.
    #[inline]
    pub fn record_remove(&self, size: u64) {
        self.entries.fetch_sub(1, Ordering::Relaxed);
        self.bytes.fetch_sub(size, Ordering::Relaxed);
    }

    /// Record an insertion refused because it could never fit.
    #[inline]
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn eviction_count(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Compute the cache hit rate as a fraction (0.0 to 1.0).
    ///
    /// Returns 0.0 if no lookups have been performed.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hit_count();
        let total = hits + self.miss_count();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Create a snapshot of current values.
    pub fn snapshot(&self, name: &'static str, limit: u64) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            name,
            hits: self.hit_count(),
            misses: self.miss_count(),
            entries: self.entries.load(Ordering::Relaxed),
            evictions: self.eviction_count(),
            size: self.bytes.load(Ordering::Relaxed),
            limit,
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub name: &'static str,
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
    pub evictions: u64,
    /// Sum of entry sizes in the cache's own unit.
    pub size: u64,
    pub limit: u64,
    pub rejected: u64,
}

impl CacheStatsSnapshot {
    /// Hit rate as a fraction (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats::new();
        assert!((stats.hit_rate() - 0.0).abs() < f64::EPSILON);

        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_insert_and_evict_track_residency() {
        let stats = CacheStats::new();
        stats.record_insert(100);
        stats.record_insert(50);
        stats.record_eviction(100);

        let snap = stats.snapshot("test", 1000);
        assert_eq!(snap.entries, 1);
        assert_eq!(snap.size, 50);
        assert_eq!(snap.evictions, 1);
        assert_eq!(snap.limit, 1000);
    }

    #[test]
    fn test_snapshot_serializes_flat() {
        let stats = CacheStats::new();
        stats.record_miss();
        stats.record_insert(7);
        stats.record_rejected();

        let json = serde_json::to_value(stats.snapshot("small-files", 64)).unwrap();
        assert_eq!(json["name"], "small-files");
        assert_eq!(json["misses"], 1);
        assert_eq!(json["size"], 7);
        assert_eq!(json["rejected"], 1);
    }
}
