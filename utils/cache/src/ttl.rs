use log::debug;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

struct Entry<V> {
    value: V,
    created_at: Instant,
}

/// Bounded map with per-entry expiry and oldest-write eviction.
///
/// This is deliberately not an LRU: lookups use [`LruCache::peek`], which
/// leaves recency untouched, so the eviction order is the order in which
/// entries were last written.
pub struct TtlCache<V> {
    entries: Option<RwLock<LruCache<String, Entry<V>>>>,
    ttl: Duration,
}

/// Snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache holding up to `capacity` entries for `ttl` each.
    ///
    /// A capacity of zero yields a disabled cache: every read misses and
    /// writes are dropped.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let entries = NonZeroUsize::new(capacity).map(|cap| RwLock::new(LruCache::new(cap)));
        Self { entries, ttl }
    }

    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry. Stale entries are reported as misses.
    pub async fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.as_ref()?.read().await;
        let entry = entries.peek(key)?;
        if entry.created_at.elapsed() >= self.ttl {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Store `value` under `key`, sweeping expired entries first and
    /// evicting the oldest entry if the cache is still full.
    pub async fn insert(&self, key: String, value: V) {
        let Some(entries) = self.entries.as_ref() else {
            return;
        };
        let mut entries = entries.write().await;
        let now = Instant::now();

        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.created_at) >= self.ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for stale in &expired {
            entries.pop(stale);
        }
        if !expired.is_empty() {
            debug!("Swept {} expired cache entries", expired.len());
        }

        if !entries.contains(&key)
            && entries.len() >= entries.cap().get()
            && let Some((evicted, _)) = entries.pop_lru()
        {
            debug!("Cache full, evicted oldest entry {evicted}");
        }

        entries.put(
            key,
            Entry {
                value,
                created_at: now,
            },
        );
    }

    pub async fn remove(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.as_ref()?.write().await;
        entries.pop(key).map(|entry| entry.value)
    }

    pub async fn clear(&self) {
        if let Some(entries) = self.entries.as_ref() {
            entries.write().await.clear();
        }
    }

    /// Number of stored entries, including ones that expired but have not
    /// been swept yet.
    pub async fn len(&self) -> usize {
        match self.entries.as_ref() {
            Some(entries) => entries.read().await.len(),
            None => 0,
        }
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        match self.entries.as_ref() {
            Some(entries) => {
                let entries = entries.read().await;
                CacheStats {
                    size: entries.len(),
                    capacity: entries.cap().get(),
                    ttl: self.ttl,
                }
            }
            None => CacheStats {
                size: 0,
                capacity: 0,
                ttl: self.ttl,
            },
        }
    }
}
