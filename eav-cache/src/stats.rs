//! Hit/miss accounting.
//!
//! Counters are plain atomics updated outside the cache lock. They only ever
//! grow (until an explicit reset), so a racing reader seeing a slightly old
//! value is harmless.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by the metadata and object caches.
#[derive(Debug, Default)]
pub struct StatisticsAccumulator {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
    rejections: AtomicU64,
}

impl StatisticsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a bulk lookup.
    pub fn record_lookups(&self, hits: u64, misses: u64) {
        self.hits.fetch_add(hits, Ordering::Relaxed);
        self.misses.fetch_add(misses, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn sets(&self) -> u64 {
        self.sets.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn rejections(&self) -> u64 {
        self.rejections.load(Ordering::Relaxed)
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.rejections.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time statistics for one domain's object cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStatistics {
    /// Number of lookups answered from the cache.
    pub hits: u64,
    /// Number of lookups that fell through to storage.
    pub misses: u64,
    /// Number of successful inserts and in-place refreshes.
    pub sets: u64,
    /// Number of entries removed to make room.
    pub evictions: u64,
    /// Number of objects the cache declined to store.
    pub rejections: u64,
    /// Number of entries currently held, expired ones included.
    pub entry_count: u64,
    /// Number of users owning at least one entry.
    pub tracked_users: u64,
}

impl CacheStatistics {
    pub fn total_lookups(&self) -> u64 {
        self.hits + self.misses
    }

    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        ratio(self.hits, self.total_lookups())
    }

    /// Calculate the miss rate (0.0 to 1.0).
    pub fn miss_ratio(&self) -> f64 {
        ratio(self.misses, self.total_lookups())
    }
}

/// Point-in-time statistics for one domain's metadata store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetadataStatistics {
    pub enabled: bool,
    pub hits: u64,
    pub misses: u64,
    pub scheme_count: u64,
    pub type_count: u64,
    /// Bindings in the external type registry.
    pub external_type_count: u64,
}

impl MetadataStatistics {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        ratio(self.hits, self.hits + self.misses)
    }
}

fn ratio(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_statistics_ratios() {
        let stats = CacheStatistics {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_ratio() - 0.8).abs() < 0.001);
        assert!((stats.miss_ratio() - 0.2).abs() < 0.001);

        let empty = CacheStatistics::default();
        assert!((empty.hit_ratio() - 0.0).abs() < 0.001);
        assert!((empty.miss_ratio() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_accumulator_counts_and_resets() {
        let acc = StatisticsAccumulator::new();
        acc.record_hit();
        acc.record_hit();
        acc.record_miss();
        acc.record_set();
        acc.record_eviction();
        acc.record_rejection();

        assert_eq!(acc.hits(), 2);
        assert_eq!(acc.misses(), 1);
        assert_eq!(acc.sets(), 1);
        assert_eq!(acc.evictions(), 1);
        assert_eq!(acc.rejections(), 1);

        acc.reset();
        assert_eq!(acc.hits() + acc.misses() + acc.sets(), 0);
        assert_eq!(acc.evictions() + acc.rejections(), 0);
    }

    #[test]
    fn test_accumulator_is_thread_safe() {
        let acc = std::sync::Arc::new(StatisticsAccumulator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let acc = std::sync::Arc::clone(&acc);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        acc.record_hit();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(acc.hits(), 4000);
    }
}
