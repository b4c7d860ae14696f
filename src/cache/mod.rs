//! Keyed time-to-live cache shared across async tasks.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

struct CacheEntry<V> {
    value: V,
    /// None when `now + ttl` is past what `Instant` can represent.
    expires: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires.map_or(true, |at| at > now)
    }
}

/// Async-safe cache whose entries expire `ttl` after insertion.
///
/// Expired entries are never returned; they are dropped lazily on access or
/// in bulk by [`TtlCache::purge_expired`].
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_fresh(Instant::now()) => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: drop it, unless a concurrent insert refreshed it meanwhile.
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if entry.is_fresh(Instant::now()) {
                return Some(entry.value.clone());
            }
            entries.remove(key);
        }
        None
    }

    pub async fn insert(&self, key: K, value: V) {
        let entry = CacheEntry {
            value,
            expires: Instant::now().checked_add(self.ttl),
        };
        self.entries.write().await.insert(key, entry);
    }

    pub async fn invalidate(&self, key: &K) -> bool {
        self.entries.write().await.remove(key).is_some()
    }

    pub async fn invalidate_all(&self) {
        self.entries.write().await.clear();
    }

    /// Drop every expired entry, returning how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    /// Number of stored entries, including any not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
