use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::model::FeedPayload;

struct CacheEntry {
    stored_at: Instant,
    payload: FeedPayload,
}

/// In-memory fetch results keyed by normalized feed URL.
///
/// Expiry is lazy: an entry older than the freshness window is treated as
/// absent and dropped when it is next looked up. Nothing sweeps in the
/// background. Capacity is bounded; inserting past it drops the least
/// recently used feed.
pub struct FeedCache {
    ttl: Duration,
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl FeedCache {
    pub fn new(ttl: Duration, capacity: NonZeroUsize) -> Self {
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Returns a copy of the fresh entry for `url`, evicting it if stale.
    pub fn get(&self, url: &str) -> Option<FeedPayload> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let fresh = entries
            .get(url)
            .map(|entry| entry.stored_at.elapsed() < self.ttl)?;

        if fresh {
            entries.get(url).map(|entry| entry.payload.clone())
        } else {
            entries.pop(url);
            tracing::debug!(url = %url, "Evicted stale cache entry");
            None
        }
    }

    /// Stores `payload` under `url`, replacing any previous entry wholesale.
    pub fn insert(&self, url: &str, payload: FeedPayload) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.put(
            url.to_owned(),
            CacheEntry {
                stored_at: Instant::now(),
                payload,
            },
        );
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
