//! Bounded metadata cache for stat results.
//!
//! Maps a path's cache key to either a stat result or a cached miss. Entries
//! may carry a TTL; expired entries read as a miss and are dropped on access.
//! Capacity is strict: after every `set` the cache holds at most `max_items`
//! entries, evicting least-recently-used ones one at a time.

use std::sync::Arc;
use std::time::{Duration, Instant};

use blobfs_types::{BlobPath, StatResult};
use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

/// Default entry bound.
pub const DEFAULT_MAX_ITEMS: usize = 1000;

/// Source of "now" for TTL checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to. For TTL tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// A cached stat outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedStat {
    Found(StatResult),
    /// The path was looked up and does not exist.
    Missing,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedStat,
    expires_at: Option<Instant>,
}

/// Shared LRU + TTL stat cache.
///
/// Safe to share between handles and threads; every method takes `&self`.
pub struct MetadataCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    max_items: usize,
    clock: Arc<dyn Clock>,
}

impl MetadataCache {
    pub fn new(max_items: usize) -> Self {
        Self::with_clock(max_items, Arc::new(SystemClock))
    }

    pub fn with_clock(max_items: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(LruCache::unbounded()),
            max_items,
            clock,
        }
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Look up a key. A live hit becomes most-recently-used.
    pub fn get(&self, key: &str) -> Option<CachedStat> {
        let mut entries = self.entries.lock();
        let expired = match entries.peek(key) {
            None => return None,
            Some(entry) => entry.expires_at.is_some_and(|at| self.clock.now() >= at),
        };
        if expired {
            trace!(key, "cache entry expired");
            entries.pop(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value)
    }

    /// Insert or replace a key as most-recently-used.
    ///
    /// A zero `ttl` never expires by time.
    pub fn set(&self, key: impl Into<String>, value: CachedStat, ttl: Duration) {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(self.clock.now() + ttl)
        };
        let mut entries = self.entries.lock();
        entries.put(key.into(), CacheEntry { value, expires_at });
        while entries.len() > self.max_items {
            if let Some((evicted, _)) = entries.pop_lru() {
                trace!(key = %evicted, "cache evicted");
            }
        }
    }

    pub fn remove(&self, key: &str) -> Option<CachedStat> {
        self.entries.lock().pop(key).map(|entry| entry.value)
    }

    /// True if the key is present, expired or not. Does not touch recency.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Drop everything a mutation of `path` could have made stale: the path
    /// itself, its trailing-slash form, and every ancestor.
    pub fn invalidate(&self, path: &BlobPath) {
        let mut entries = self.entries.lock();
        let key = path.cache_key();
        let trimmed = key.trim_end_matches('/');
        entries.pop(trimmed);
        entries.pop(&format!("{trimmed}/"));
        entries.pop(&key);
        for ancestor in path.ancestors() {
            let key = ancestor.cache_key();
            entries.pop(&key);
            entries.pop(&format!("{key}/"));
        }
    }

    /// Like [`MetadataCache::invalidate`], and also drop every entry below
    /// `path`. Used when a whole bucket goes away.
    pub fn invalidate_tree(&self, path: &BlobPath) {
        self.invalidate(path);
        let below = format!("{}/", path.cache_key().trim_end_matches('/'));
        let mut entries = self.entries.lock();
        let stale: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(&below))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.pop(key);
        }
        trace!(prefix = %below, dropped = stale.len(), "cache subtree invalidated");
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITEMS)
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("len", &self.len())
            .field("max_items", &self.max_items)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn file(size: u64) -> CachedStat {
        CachedStat::Found(StatResult::file(size, 0))
    }

    #[test]
    fn test_get_miss() {
        let cache = MetadataCache::new(4);
        assert_eq!(cache.get("blob://b/k"), None);
    }

    #[test]
    fn test_set_get_and_missing() {
        let cache = MetadataCache::new(4);
        cache.set("blob://b/a", file(3), Duration::ZERO);
        cache.set("blob://b/gone", CachedStat::Missing, Duration::ZERO);
        assert_eq!(cache.get("blob://b/a"), Some(file(3)));
        assert_eq!(cache.get("blob://b/gone"), Some(CachedStat::Missing));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let cache = MetadataCache::new(2);
        cache.set("a", file(1), Duration::ZERO);
        cache.set("b", file(2), Duration::ZERO);
        assert!(cache.get("a").is_some());
        cache.set("c", file(3), Duration::ZERO);

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_set_existing_moves_to_mru() {
        let cache = MetadataCache::new(2);
        cache.set("a", file(1), Duration::ZERO);
        cache.set("b", file(2), Duration::ZERO);
        cache.set("a", file(10), Duration::ZERO);
        cache.set("c", file(3), Duration::ZERO);

        assert_eq!(cache.get("a"), Some(file(10)));
        assert!(!cache.contains("b"));
    }

    #[test]
    fn test_ttl_expiry_no_resurrection() {
        let clock = Arc::new(ManualClock::new());
        let cache = MetadataCache::with_clock(8, clock.clone());
        cache.set("short", file(1), Duration::from_secs(5));
        cache.set("forever", file(2), Duration::ZERO);

        clock.advance(Duration::from_secs(4));
        assert!(cache.get("short").is_some());

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("short"), None);
        assert!(!cache.contains("short"));
        assert_eq!(cache.get("short"), None);

        clock.advance(Duration::from_secs(3600));
        assert_eq!(cache.get("forever"), Some(file(2)));
    }

    #[test]
    fn test_invalidate_removes_ancestors() {
        let cache = MetadataCache::new(16);
        for key in [
            "blob://b/docs/readme.txt",
            "blob://b/docs",
            "blob://b/docs/",
            "blob://b",
            "blob://b/other",
        ] {
            cache.set(key, CachedStat::Missing, Duration::ZERO);
        }

        cache.invalidate(&BlobPath::parse("BLOB://b/docs/readme.txt"));

        assert!(!cache.contains("blob://b/docs/readme.txt"));
        assert!(!cache.contains("blob://b/docs"));
        assert!(!cache.contains("blob://b/docs/"));
        assert!(!cache.contains("blob://b"));
        assert!(cache.contains("blob://b/other"));
    }

    #[test]
    fn test_invalidate_tree_drops_descendants() {
        let cache = MetadataCache::new(16);
        for key in [
            "blob://b",
            "blob://b/k.txt",
            "blob://b/docs/deep/file",
            "blob://bb/k.txt",
            "blob://",
        ] {
            cache.set(key, file(1), Duration::ZERO);
        }

        cache.invalidate_tree(&BlobPath::parse("blob://b"));

        assert!(!cache.contains("blob://b"));
        assert!(!cache.contains("blob://b/k.txt"));
        assert!(!cache.contains("blob://b/docs/deep/file"));
        assert!(!cache.contains("blob://"));
        assert!(cache.contains("blob://bb/k.txt"));
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = MetadataCache::new(4);
        cache.set("a", file(1), Duration::ZERO);
        cache.set("b", file(1), Duration::ZERO);
        assert_eq!(cache.remove("a"), Some(file(1)));
        assert_eq!(cache.remove("a"), None);
        cache.clear();
        assert!(cache.is_empty());
    }

    proptest! {
        #[test]
        fn prop_lru_bound(max in 1usize..32, extra in 0usize..32) {
            let cache = MetadataCache::new(max);
            let total = max + extra;
            for i in 0..total {
                cache.set(format!("k{i}"), file(i as u64), Duration::ZERO);
            }
            prop_assert_eq!(cache.len(), max);
            for i in 0..extra {
                let key = format!("k{i}");
                prop_assert!(!cache.contains(&key));
            }
            for i in extra..total {
                let key = format!("k{i}");
                prop_assert!(cache.contains(&key));
            }
        }
    }
}
