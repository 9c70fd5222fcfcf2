//! Bounded LRU cache with per-entry TTL.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

use lru::LruCache;

/// An LRU cache whose entries expire after a fixed TTL. Expired entries are
/// dropped lazily on access.
pub struct TtlCache<K: Hash + Eq, V> {
    entries: LruCache<K, (Instant, V)>,
    ttl: Duration,
}

impl<K: Hash + Eq, V: Clone> TtlCache<K, V> {
    /// Create a cache holding at most `capacity` entries for `ttl` each.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            ttl,
        }
    }

    /// Fetch a live entry, refreshing its LRU position.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some((inserted, value)) if inserted.elapsed() < self.ttl => {
                return Some(value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.pop(key);
        }
        None
    }

    /// Insert or replace an entry, resetting its TTL.
    pub fn insert(&mut self, key: K, value: V) {
        self.entries.put(key, (Instant::now(), value));
    }

    /// Remove a single entry.
    pub fn invalidate(&mut self, key: &K) {
        self.entries.pop(key);
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Live-or-expired entry count (expired entries not yet swept).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut cache: TtlCache<String, u32> = TtlCache::new(4, Duration::from_secs(60));
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"b".to_string()), None);
    }

    #[test]
    fn test_expiry() {
        let mut cache: TtlCache<String, u32> = TtlCache::new(4, Duration::ZERO);
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), None);
    }

    #[test]
    fn test_capacity_bound() {
        let mut cache: TtlCache<u32, u32> = TtlCache::new(2, Duration::from_secs(60));
        cache.insert(1, 1);
        cache.insert(2, 2);
        cache.insert(3, 3);
        assert!(cache.len() <= 2);
        assert_eq!(cache.get(&1), None);
    }

    #[test]
    fn test_clear() {
        let mut cache: TtlCache<u32, u32> = TtlCache::new(4, Duration::from_secs(60));
        cache.insert(1, 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
