//! Bounded in-process LRU tier.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

use super::envelope::CacheEntry;

/// Least-recently-used store with a fixed maximum item count.
///
/// Recency is refreshed by [`get`](Self::get) and [`set`](Self::set);
/// [`has`](Self::has) and [`peek`](Self::peek) leave it untouched.
pub struct LocalTier {
    entries: Mutex<LruCache<String, CacheEntry>>,
    capacity: NonZeroUsize,
}

impl LocalTier {
    /// Create a tier holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.lock().contains(key)
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().get(key).cloned()
    }

    /// Read without touching recency.
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.entries.lock().peek(key).cloned()
    }

    /// Insert or replace, evicting the least recently used entry when full.
    pub fn set(&self, key: &str, entry: CacheEntry) {
        let evicted = self.entries.lock().push(key.to_string(), entry);
        if let Some((evicted_key, _)) = evicted {
            if evicted_key != key {
                tracing::debug!(key = %evicted_key, "evicted from local tier");
            }
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.lock().pop(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}
