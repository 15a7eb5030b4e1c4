//! Concurrent dispatch caches
//!
//! Memo tables keyed by a concrete runtime type (or a pair of them). Values
//! are computed from frozen state, so two threads racing on the same key
//! compute the same result; the first insert wins and later ones are dropped.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Cache statistics for monitoring
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Lazily populated, never-evicted memo table.
#[derive(Debug)]
pub struct DispatchCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, V>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> Default for DispatchCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }
}

impl<K, V> DispatchCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key`, computing it on a miss.
    ///
    /// `compute` runs without any shard lock held, so it may itself consult
    /// other caches (or this one, for a different key).
    pub fn get_or_compute(&self, key: K, compute: impl FnOnce() -> V) -> V {
        if let Some(hit) = self.entries.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return hit.value().clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute();
        self.entries.entry(key).or_insert(value).value().clone()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of computations performed so far.
    pub fn scans(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_hit_and_miss() {
        let cache: DispatchCache<u32, Option<u32>> = DispatchCache::new();
        assert_eq!(cache.get_or_compute(1, || Some(10)), Some(10));
        assert_eq!(cache.get_or_compute(1, || Some(99)), Some(10));
        assert_eq!(cache.get_or_compute(2, || None), None);
        assert_eq!(cache.get_or_compute(2, || Some(5)), None);

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.entries, 2);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_concurrent_insert_is_consistent() {
        let cache = Arc::new(DispatchCache::<u32, u32>::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || (0..64).map(|k| cache.get_or_compute(k, || k * 2)).sum::<u32>())
            })
            .collect();

        let expected: u32 = (0..64).map(|k| k * 2).sum();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
        assert_eq!(cache.len(), 64);
    }
}
