//! TTL-bounded in-memory store.
//!
//! The store maps key strings to cached JSON payloads with an absolute
//! expiry instant. Expired entries behave as absent: `get` removes them
//! lazily when it encounters them, and [`MemoryCache::cleanup_expired`]
//! sweeps the rest (called periodically by the background task, or on
//! demand).
//!
//! A secondary family index (family prefix → keys inserted under it) makes
//! grouped invalidation a direct lookup instead of a scan over every key.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

use crate::keys::CacheKey;

/// Cached payload with expiration.
///
/// The value is wrapped in `Arc` so cache hits clone a pointer rather than
/// the payload itself.
struct CachedEntry {
    value: Arc<Value>,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Cache statistics for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of entries currently in the store (live or awaiting sweep).
    pub size: usize,
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries removed by expiry (lazy or swept).
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate as a percentage of all lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// In-memory TTL cache, per-instance.
///
/// Thread-safe and shareable across async tasks. Every operation is
/// synchronous; the store never suspends.
pub struct MemoryCache {
    entries: DashMap<String, CachedEntry>,
    /// Family prefix -> keys inserted under it, for grouped invalidation.
    /// May retain keys the store has already evicted; deleting an absent
    /// key is a no-op, so stale index entries are harmless.
    family_index: DashMap<String, Vec<String>>,
    /// Soft cap on entry count. At capacity, inserts sweep expired entries
    /// first and are skipped if the store is still full.
    max_entries: usize,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MemoryCache {
    /// Create a cache holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            family_index: DashMap::new(),
            max_entries,
            enabled: true,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Create a disabled cache: stores nothing, every lookup misses.
    pub fn disabled() -> Self {
        let mut cache = Self::new(0);
        cache.enabled = false;
        cache
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Get the value stored under `key`, if present and not expired.
    ///
    /// An expired entry encountered here is removed before returning
    /// absence.
    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        if !self.enabled {
            return None;
        }

        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.value));
            }
            // Release the read guard before removing.
            drop(entry);
            self.entries.remove(key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert or overwrite the entry for `key`. Overwriting resets the TTL
    /// window.
    ///
    /// At capacity, expired entries are swept first; if the store is still
    /// full the insert is skipped — the caller falls through to the source
    /// on its next lookup, so skipping is always safe.
    pub fn set(&self, key: &CacheKey, value: Value, ttl: Duration) {
        if !self.enabled {
            return;
        }

        if self.entries.len() >= self.max_entries && !self.entries.contains_key(key.as_str()) {
            self.cleanup_expired();

            if self.entries.len() >= self.max_entries {
                tracing::warn!(
                    key = %key,
                    max_entries = self.max_entries,
                    "cache at capacity, skipping insert"
                );
                return;
            }
        }

        self.entries.insert(
            key.as_str().to_string(),
            CachedEntry {
                value: Arc::new(value),
                expires_at: Instant::now() + ttl,
            },
        );

        let mut family = self.family_index.entry(key.family().to_string()).or_default();
        if !family.iter().any(|k| k == key.as_str()) {
            family.push(key.as_str().to_string());
        }
    }

    /// Remove the entry for `key`. No-op if absent.
    pub fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Remove every key inserted under `family`. Returns the number of
    /// entries actually removed.
    pub fn delete_family(&self, family: &str) -> usize {
        let Some((_, keys)) = self.family_index.remove(family) else {
            return 0;
        };

        let mut removed = 0;
        for key in keys {
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Remove all entries unconditionally.
    pub fn clear(&self) {
        self.entries.clear();
        self.family_index.clear();
    }

    /// Sweep expired entries. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
            // Drop index entries that no longer point at anything.
            self.family_index.retain(|_, keys| {
                keys.retain(|k| self.entries.contains_key(k));
                !keys.is_empty()
            });
        }

        removed
    }

    /// Keys of entries that are present and not yet expired. Diagnostics
    /// only.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys;
    use serde_json::json;

    fn set(cache: &MemoryCache, key: &CacheKey, value: Value) {
        cache.set(key, value, Duration::from_secs(60));
    }

    #[test]
    fn test_set_and_get() {
        let cache = MemoryCache::new(100);
        let key = keys::user_sessions("u1", 1, 20);

        set(&cache, &key, json!(["s1", "s2"]));

        let value = cache.get(key.as_str()).expect("should be cached");
        assert_eq!(*value, json!(["s1", "s2"]));

        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn test_miss_on_absent_key() {
        let cache = MemoryCache::new(100);

        assert!(cache.get("user_sessions:nobody:1:20").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_expired_entry_behaves_as_absent() {
        let cache = MemoryCache::new(100);
        let key = keys::user_sessions("u1", 1, 20);

        cache.set(&key, json!(["s1"]), Duration::from_millis(10));
        assert!(cache.get(key.as_str()).is_some());

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.get(key.as_str()).is_none());
        // Lazy eviction removed the entry.
        assert_eq!(cache.stats().size, 0);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value_and_resets_ttl() {
        let cache = MemoryCache::new(100);
        let key = keys::user_sessions("u1", 1, 20);

        cache.set(&key, json!(["old"]), Duration::from_millis(30));
        cache.set(&key, json!(["new"]), Duration::from_secs(60));

        // Past the original expiry: the overwrite's TTL window applies and
        // the old value is gone.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let value = cache.get(key.as_str()).expect("overwrite reset the TTL");
        assert_eq!(*value, json!(["new"]));
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn test_delete_absent_key_is_noop() {
        let cache = MemoryCache::new(100);
        let key = keys::user_sessions("u1", 1, 20);
        set(&cache, &key, json!(["s1"]));

        cache.delete("user_sessions:other:1:20");

        assert_eq!(cache.stats().size, 1);
        assert!(cache.get(key.as_str()).is_some());
    }

    #[test]
    fn test_clear_empties_store() {
        let cache = MemoryCache::new(100);
        let keys: Vec<_> = (0..5).map(|i| keys::user_sessions("u1", i, 20)).collect();
        for key in &keys {
            set(&cache, key, json!([]));
        }
        assert_eq!(cache.stats().size, 5);

        cache.clear();

        assert_eq!(cache.stats().size, 0);
        for key in &keys {
            assert!(cache.get(key.as_str()).is_none());
        }
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired() {
        let cache = MemoryCache::new(100);
        let short = keys::user_sessions("u1", 1, 20);
        let long = keys::message_history("s1", 1, 50);

        cache.set(&short, json!(["stale"]), Duration::from_millis(1));
        cache.set(&long, json!(["fresh"]), Duration::from_secs(60));

        tokio::time::sleep(Duration::from_millis(10)).await;

        let removed = cache.cleanup_expired();
        assert_eq!(removed, 1);
        assert_eq!(cache.stats().size, 1);
        assert!(cache.get(long.as_str()).is_some());
        assert!(cache.get(short.as_str()).is_none());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let cache = MemoryCache::new(100);
        assert_eq!(cache.cleanup_expired(), 0);
        assert_eq!(cache.cleanup_expired(), 0);
    }

    #[test]
    fn test_delete_family_removes_all_variants() {
        let cache = MemoryCache::new(100);
        set(&cache, &keys::user_sessions("u1", 1, 20), json!(["a"]));
        set(&cache, &keys::user_sessions("u1", 2, 20), json!(["b"]));
        set(&cache, &keys::user_sessions("u1", 1, 50), json!(["c"]));
        let unrelated = keys::session_permission("u1", "s1");
        set(&cache, &unrelated, json!(true));

        let removed = cache.delete_family(&keys::user_sessions_family("u1"));

        assert_eq!(removed, 3);
        assert!(cache.get("user_sessions:u1:1:20").is_none());
        assert!(cache.get("user_sessions:u1:2:20").is_none());
        assert!(cache.get("user_sessions:u1:1:50").is_none());
        assert!(cache.get(unrelated.as_str()).is_some());
    }

    #[test]
    fn test_delete_family_unknown_family_is_noop() {
        let cache = MemoryCache::new(100);
        set(&cache, &keys::user_sessions("u1", 1, 20), json!(["a"]));

        assert_eq!(cache.delete_family(&keys::user_sessions_family("u2")), 0);
        assert_eq!(cache.stats().size, 1);
    }

    #[test]
    fn test_overwrite_does_not_duplicate_family_index() {
        let cache = MemoryCache::new(100);
        let key = keys::user_sessions("u1", 1, 20);
        set(&cache, &key, json!(["a"]));
        set(&cache, &key, json!(["b"]));

        assert_eq!(cache.delete_family(key.family()), 1);
    }

    #[test]
    fn test_insert_skipped_at_capacity() {
        let cache = MemoryCache::new(2);
        set(&cache, &keys::user_sessions("u1", 1, 20), json!(["a"]));
        set(&cache, &keys::user_sessions("u2", 1, 20), json!(["b"]));
        set(&cache, &keys::user_sessions("u3", 1, 20), json!(["c"]));

        // Nothing expired, so the third insert was skipped.
        assert_eq!(cache.stats().size, 2);
        assert!(cache.get("user_sessions:u3:1:20").is_none());
    }

    #[test]
    fn test_overwrite_allowed_at_capacity() {
        let cache = MemoryCache::new(1);
        let key = keys::user_sessions("u1", 1, 20);
        set(&cache, &key, json!(["a"]));
        set(&cache, &key, json!(["b"]));

        let value = cache.get(key.as_str()).expect("overwrite should land");
        assert_eq!(*value, json!(["b"]));
    }

    #[tokio::test]
    async fn test_capacity_sweep_frees_room_for_insert() {
        let cache = MemoryCache::new(2);
        cache.set(
            &keys::user_sessions("u1", 1, 20),
            json!(["a"]),
            Duration::from_millis(1),
        );
        cache.set(
            &keys::user_sessions("u2", 1, 20),
            json!(["b"]),
            Duration::from_secs(60),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;

        // At capacity, but the expired u1 entry is swept to make room.
        let key = keys::user_sessions("u3", 1, 20);
        set(&cache, &key, json!(["c"]));
        assert!(cache.get(key.as_str()).is_some());
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = MemoryCache::disabled();
        let key = keys::user_sessions("u1", 1, 20);
        set(&cache, &key, json!(["a"]));

        assert!(!cache.is_enabled());
        assert!(cache.get(key.as_str()).is_none());
        assert_eq!(cache.stats().size, 0);
        // Disabled lookups do not skew the counters.
        assert_eq!(cache.stats().misses, 0);
    }

    #[tokio::test]
    async fn test_keys_lists_live_entries_only() {
        let cache = MemoryCache::new(100);
        cache.set(
            &keys::user_sessions("u1", 1, 20),
            json!(["a"]),
            Duration::from_millis(1),
        );
        cache.set(
            &keys::session_permission("u1", "s1"),
            json!(true),
            Duration::from_secs(60),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(cache.keys(), vec!["session_permission:u1:s1".to_string()]);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            size: 10,
            hits: 75,
            misses: 25,
            evictions: 0,
        };
        assert!((stats.hit_rate() - 75.0).abs() < 0.001);
        assert!((CacheStats::default().hit_rate() - 0.0).abs() < 0.001);
    }
}
