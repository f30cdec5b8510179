use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
}

/// In-memory key/value store whose entries expire after a fixed TTL.
///
/// Expiry is lazy: `get` treats a stale entry as absent but leaves it in place.
/// Stale entries are only dropped by `put` over them, `delete`, or `purge_expired`.
pub struct TtlCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Clone out the value for `key` if present and younger than the TTL.
    pub fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|entry| self.is_valid(entry))
            .map(|entry| entry.value.clone())
    }

    /// Store `value`, replacing any previous entry and restarting its TTL.
    pub fn put(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            stored_at: Instant::now(),
        };
        self.entries.write().insert(key, entry);
    }

    /// Remove the entry for `key`. Returns whether anything was removed.
    pub fn delete(&self, key: &K) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| self.is_valid(entry));
        before - entries.len()
    }

    /// Number of stored entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn is_valid(&self, entry: &CacheEntry<V>) -> bool {
        entry.stored_at.elapsed() < self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn test_get_put_roundtrip() {
        let cache: TtlCache<String, u32> = TtlCache::new(TTL);
        assert_eq!(cache.get(&"a".to_string()), None);

        cache.put("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_at_ttl() {
        let cache: TtlCache<&str, u32> = TtlCache::new(TTL);
        cache.put("a", 1);

        tokio::time::advance(TTL - Duration::from_millis(1)).await;
        assert_eq!(cache.get(&"a"), Some(1));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get(&"a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_does_not_remove_expired_entries() {
        let cache: TtlCache<&str, u32> = TtlCache::new(TTL);
        cache.put("a", 1);
        tokio::time::advance(TTL * 2).await;

        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_overwrites_and_resets_age() {
        let cache: TtlCache<&str, u32> = TtlCache::new(TTL);
        cache.put("a", 1);
        tokio::time::advance(Duration::from_secs(50)).await;

        cache.put("a", 2);
        tokio::time::advance(Duration::from_secs(50)).await;

        assert_eq!(cache.get(&"a"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete() {
        let cache: TtlCache<&str, u32> = TtlCache::new(TTL);
        cache.put("a", 1);

        assert!(cache.delete(&"a"));
        assert_eq!(cache.get(&"a"), None);
        // Deleting a missing key is a no-op
        assert!(!cache.delete(&"a"));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache: TtlCache<&str, u32> = TtlCache::new(TTL);
        cache.put("old", 1);
        tokio::time::advance(Duration::from_secs(45)).await;
        cache.put("new", 2);
        tokio::time::advance(Duration::from_secs(30)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"new"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_instances_are_independent() {
        let long: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(3600));
        let short: TtlCache<&str, u32> = TtlCache::new(Duration::from_secs(300));
        long.put("k", 1);
        short.put("k", 2);

        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(long.get(&"k"), Some(1));
        assert_eq!(short.get(&"k"), None);
    }
}
