//! Generic key/value cache with per-entry time-to-live.
//!
//! Every `put` schedules its own eviction task; replacing or removing a key
//! aborts the pending task, and a task that fires late is a no-op unless the
//! entry it was scheduled for is still the live one. Reads treat an
//! expired-but-not-yet-evicted entry exactly like a missing key.

use log::trace;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    ttl: Duration,
    generation: u64,
    reaper: JoinHandle<()>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// Shared handle to an expiring map. Cloning is cheap; all clones observe
/// the same entries.
pub struct TemporalCache<K, V> {
    entries: Arc<Mutex<HashMap<K, CacheEntry<V>>>>,
    generation: Arc<AtomicU64>,
    default_ttl: Duration,
}

impl<K, V> Clone for TemporalCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            generation: Arc::clone(&self.generation),
            default_ttl: self.default_ttl,
        }
    }
}

impl<K, V> TemporalCache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Stores `value` under `key` for `ttl` (the cache default when `None`).
    /// A live entry under the same key is replaced and its pending eviction
    /// cancelled before the new eviction is scheduled. Must be called from
    /// within a tokio runtime.
    pub async fn put(&self, key: K, value: V, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries.lock().await;
        if let Some(prev) = entries.remove(&key) {
            prev.reaper.abort();
        }
        let reaper = tokio::spawn(Self::evict_after(
            Arc::clone(&self.entries),
            key.clone(),
            generation,
            ttl,
        ));
        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
                ttl,
                generation,
                reaper,
            },
        );
    }

    /// Eviction task body: one scheduled unit of work per `put`. It
    /// re-acquires the map lock after sleeping and removes the entry only if
    /// the generation still matches; the key may have been replaced or
    /// removed while it slept.
    async fn evict_after(
        entries: Arc<Mutex<HashMap<K, CacheEntry<V>>>>,
        key: K,
        generation: u64,
        ttl: Duration,
    ) {
        tokio::time::sleep(ttl).await;
        let mut entries = entries.lock().await;
        let live = matches!(entries.get(&key), Some(entry) if entry.generation == generation);
        if live {
            entries.remove(&key);
            trace!("Evicted cache entry after {:?}", ttl);
        }
    }

    /// Returns the live value under `key`, or `None` when the key is missing
    /// or its entry has expired (evicted or not).
    pub async fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.lock().await;
        entries
            .get(key)
            .filter(|entry| !entry.is_expired())
            .map(|entry| entry.value.clone())
    }

    /// True iff a non-expired entry exists for `key`.
    pub async fn contains(&self, key: &K) -> bool {
        let entries = self.entries.lock().await;
        entries.get(key).map_or(false, |entry| !entry.is_expired())
    }

    /// Removes the entry and cancels its pending eviction; no-op when absent.
    pub async fn remove(&self, key: &K) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.remove(key) {
            entry.reaper.abort();
        }
    }

    /// Point-in-time copy of all live entries.
    pub async fn snapshot(&self) -> HashMap<K, V> {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired())
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    /// Number of entries physically present, expired or not. Eviction tasks
    /// shrink this on their own; useful to observe that they did.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::time::sleep;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn cache() -> TemporalCache<String, u32> {
        TemporalCache::new(secs(60))
    }

    #[tokio::test(start_paused = true)]
    async fn value_visible_for_entire_window() {
        let cache = cache();
        cache.put("k".to_string(), 7, None).await;
        assert_eq!(cache.get(&"k".to_string()).await, Some(7));
        sleep(secs(59)).await;
        assert_eq!(cache.get(&"k".to_string()).await, Some(7));
        assert!(cache.contains(&"k".to_string()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_self_removes_after_ttl() {
        let cache = cache();
        cache.put("k".to_string(), 7, Some(secs(5))).await;
        sleep(secs(6)).await;
        assert_eq!(cache.get(&"k".to_string()).await, None);
        assert!(!cache.contains(&"k".to_string()).await);
        // The eviction task drained the map; no manual sweep involved.
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reput_resets_the_eviction_point() {
        let cache = cache();
        cache.put("k".to_string(), 1, Some(secs(10))).await;
        sleep(secs(8)).await;
        cache.put("k".to_string(), 2, Some(secs(10))).await;
        // 16s after the first put: the original timer would have fired at
        // 10s, but it was cancelled; the entry lives until 18s.
        sleep(secs(8)).await;
        assert_eq!(cache.get(&"k".to_string()).await, Some(2));
        sleep(secs(3)).await;
        assert_eq!(cache.get(&"k".to_string()).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn remove_then_reinsert_survives_stale_timer() {
        let cache = cache();
        cache.put("k".to_string(), 1, Some(secs(5))).await;
        cache.remove(&"k".to_string()).await;
        assert_eq!(cache.get(&"k".to_string()).await, None);
        cache.put("k".to_string(), 2, Some(secs(60))).await;
        // Past the first entry's deadline: its timer must not touch the
        // replacement.
        sleep(secs(6)).await;
        assert_eq!(cache.get(&"k".to_string()).await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_leaves_other_keys_alone() {
        let cache = cache();
        cache.put("short".to_string(), 1, Some(secs(5))).await;
        cache.put("long".to_string(), 2, Some(secs(60))).await;
        sleep(secs(6)).await;
        assert_eq!(cache.get(&"short".to_string()).await, None);
        assert_eq!(cache.get(&"long".to_string()).await, Some(2));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_excludes_expired_entries() {
        let cache = cache();
        cache.put("short".to_string(), 1, Some(secs(5))).await;
        cache.put("long".to_string(), 2, Some(secs(60))).await;
        sleep(secs(6)).await;
        let snapshot = cache.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("long"), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn default_ttl_applies_when_unspecified() {
        let cache = cache();
        cache.put("k".to_string(), 7, None).await;
        sleep(secs(59)).await;
        assert!(cache.contains(&"k".to_string()).await);
        sleep(secs(2)).await;
        assert!(!cache.contains(&"k".to_string()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn clones_share_entries() {
        let cache = cache();
        let other = cache.clone();
        cache.put("k".to_string(), 7, None).await;
        assert_eq!(other.get(&"k".to_string()).await, Some(7));
        other.remove(&"k".to_string()).await;
        assert_eq!(cache.get(&"k".to_string()).await, None);
    }
}
