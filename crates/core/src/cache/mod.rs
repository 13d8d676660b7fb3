//! In-process memoization with explicit invalidation.
//!
//! Used in front of catalog reads and collector calls. Backed by a moka
//! cache, so entries expire after a TTL and the size stays within
//! `max_entries`. Nothing here is a source of truth: writers must
//! invalidate the keys they change.

mod config;

pub use config::CacheConfig;

use std::hash::Hash;
use std::sync::Mutex;
use std::time::Duration;

use moka::sync::Cache;

/// A TTL cache safe to share across tasks.
///
/// Every invalidation bumps a generation counter. A read-through caller
/// takes [`TtlCache::generation`] before reading the source and stores the
/// result with [`TtlCache::insert_if_unchanged`], which refuses the value if
/// any key was invalidated in between.
pub struct TtlCache<K, V> {
    entries: Cache<K, V>,
    generation: Mutex<u64>,
    ttl: Duration,
    max_entries: u64,
}

impl<K, V> std::fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        let max_entries = max_entries.max(1) as u64;
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self {
            entries,
            generation: Mutex::new(0),
            ttl,
            max_entries,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Duration::from_secs(config.ttl_secs), config.max_entries)
    }

    /// Cached value, if present and not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key)
    }

    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(key, value);
    }

    /// Current invalidation generation.
    pub fn generation(&self) -> u64 {
        *self.generation.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert only if nothing was invalidated since `since` was taken.
    pub fn insert_if_unchanged(&self, since: u64, key: K, value: V) -> bool {
        let generation = self.generation.lock().unwrap_or_else(|e| e.into_inner());
        if *generation != since {
            return false;
        }
        self.entries.insert(key, value);
        true
    }

    pub fn invalidate(&self, key: &K) {
        let mut generation = self.generation.lock().unwrap_or_else(|e| e.into_inner());
        *generation += 1;
        self.entries.invalidate(key);
    }

    pub fn clear(&self) {
        let mut generation = self.generation.lock().unwrap_or_else(|e| e.into_inner());
        *generation += 1;
        self.entries.invalidate_all();
    }

    /// Entry count after pending evictions have been applied.
    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let cache = TtlCache::new(Duration::from_secs(60), 10);
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
        assert_eq!(cache.get(&"b".to_string()), None);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = TtlCache::new(Duration::from_millis(10), 10);
        cache.insert("a", 1);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let cache = TtlCache::new(Duration::from_secs(60), 10);
        cache.insert("a", 1);
        cache.invalidate(&"a");
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_size_stays_bounded() {
        let cache = TtlCache::new(Duration::from_secs(60), 2);
        for i in 0..20 {
            cache.insert(i, i * 10);
        }
        assert!(cache.len() <= 2);
    }

    #[test]
    fn test_insert_after_invalidation_is_refused() {
        let cache = TtlCache::new(Duration::from_secs(60), 10);
        let since = cache.generation();
        cache.invalidate(&"a");

        assert!(!cache.insert_if_unchanged(since, "a", 1));
        assert_eq!(cache.get(&"a"), None);

        let since = cache.generation();
        assert!(cache.insert_if_unchanged(since, "a", 2));
        assert_eq!(cache.get(&"a"), Some(2));
    }

    #[test]
    fn test_clear() {
        let cache = TtlCache::new(Duration::from_secs(60), 10);
        cache.insert(1, "x");
        cache.insert(2, "y");
        cache.clear();
        assert!(cache.is_empty());
    }
}
