//! Expiring in-memory cache
//!
//! Used by the messaging client to memoize GET responses from the fog, and
//! available to any component that needs a TTL map. Entries expire lazily on
//! access; `purge_expired` exists for periodic sweeps.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Cache entry with expiration support
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Statistics about cache usage
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Number of lookups that returned a live entry
    pub hits: u64,
    /// Number of lookups that found nothing (or an expired entry)
    pub misses: u64,
    /// Number of entries dropped because their TTL elapsed
    pub expirations: u64,
    /// Number of inserted entries
    pub insertions: u64,
}

/// In-memory cache where every entry lives for a fixed TTL
#[derive(Debug)]
pub struct ExpiringCache<K, V> {
    storage: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
    stats: RwLock<CacheStats>,
}

impl<K: Hash + Eq + Clone, V: Clone> ExpiringCache<K, V> {
    /// Create a new cache whose entries expire after `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            storage: RwLock::new(HashMap::new()),
            ttl,
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Insert a value, replacing any previous entry under the same key
    pub fn insert(&self, key: K, value: V) {
        self.storage.write().insert(key, CacheEntry::new(value, self.ttl));
        self.stats.write().insertions += 1;
    }

    /// Look up a live entry, cloning it out of the cache
    pub fn get(&self, key: &K) -> Option<V> {
        let expired = {
            let storage = self.storage.read();
            match storage.get(key) {
                Some(entry) if !entry.is_expired() => {
                    self.stats.write().hits += 1;
                    return Some(entry.value.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if expired {
            self.storage.write().remove(key);
            self.stats.write().expirations += 1;
        }
        self.stats.write().misses += 1;
        None
    }

    /// Whether a live entry exists for `key`
    pub fn contains_key(&self, key: &K) -> bool {
        self.storage.read().get(key).is_some_and(|e| !e.is_expired())
    }

    /// Drop every expired entry
    pub fn purge_expired(&self) {
        let mut storage = self.storage.write();
        let before = storage.len();
        storage.retain(|_, entry| !entry.is_expired());
        self.stats.write().expirations += (before - storage.len()) as u64;
    }

    /// Number of entries currently stored (live or not yet purged)
    pub fn len(&self) -> usize {
        self.storage.read().len()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.storage.read().is_empty()
    }

    /// Remove every entry
    pub fn clear(&self) {
        self.storage.write().clear();
    }

    /// Snapshot of usage statistics
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let cache = ExpiringCache::new(Duration::from_secs(40));
        cache.insert("/agents/self", "body".to_string());
        assert_eq!(cache.get(&"/agents/self"), Some("body".to_string()));
    }

    #[test]
    fn test_miss_on_absent_key() {
        let cache: ExpiringCache<&str, String> = ExpiringCache::new(Duration::from_secs(40));
        assert_eq!(cache.get(&"/nothing"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_expired_entry_is_dropped() {
        let cache = ExpiringCache::new(Duration::from_millis(0));
        cache.insert("key", 1u32);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&"key"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_contains_key_respects_ttl() {
        let cache = ExpiringCache::new(Duration::from_millis(0));
        cache.insert("key", 1u32);
        std::thread::sleep(Duration::from_millis(5));
        assert!(!cache.contains_key(&"key"));
    }

    #[test]
    fn test_purge_expired() {
        let cache = ExpiringCache::new(Duration::from_millis(0));
        cache.insert("a", 1u32);
        cache.insert("b", 2u32);
        std::thread::sleep(Duration::from_millis(5));
        cache.purge_expired();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expirations, 2);
    }

    #[test]
    fn test_replace_resets_value() {
        let cache = ExpiringCache::new(Duration::from_secs(40));
        cache.insert("key", 1u32);
        cache.insert("key", 2u32);
        assert_eq!(cache.get(&"key"), Some(2));
        assert_eq!(cache.len(), 1);
    }
}
