use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Cache entry metadata
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub created_at: Instant,
    pub last_accessed: Instant,
    pub access_count: u64,
    pub ttl: Option<Duration>,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            last_accessed: now,
            access_count: 1,
            ttl,
        }
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// An entry is live strictly before its TTL has elapsed.
    pub fn is_expired(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.age() >= ttl,
            None => false,
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
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

/// Lock-free hit/miss/eviction counters shared by the caches in this crate.
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn evict(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_entry_expiry() {
        let entry = CacheEntry::new("x", Some(Duration::ZERO));
        assert!(entry.is_expired());

        let entry = CacheEntry::new("x", None);
        assert!(!entry.is_expired());

        let mut entry = CacheEntry::new("x", Some(Duration::from_secs(60)));
        assert!(!entry.is_expired());
        entry.touch();
        assert_eq!(entry.access_count, 2);
    }

    #[test]
    fn test_hit_rate() {
        let counters = StatsCounters::default();
        assert_relative_eq!(counters.snapshot(0).hit_rate(), 0.0);
        counters.hit();
        counters.hit();
        counters.hit();
        counters.miss();
        counters.evict();
        let stats = counters.snapshot(2);
        assert_relative_eq!(stats.hit_rate(), 0.75);
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.entries, 2);
    }
}
