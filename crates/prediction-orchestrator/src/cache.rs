use chrono::{DateTime, Utc};
use dashmap::DashMap;

pub const DEFAULT_CACHE_TTL_SECS: i64 = 300;

/// Internal cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

/// Advisory keyed cache with a fixed TTL. A TTL of zero disables it.
pub struct TtlCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    ttl_secs: i64,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_secs: ttl_secs.max(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.ttl_secs > 0
    }

    pub fn get(&self, key: &str) -> Option<T> {
        if !self.is_enabled() {
            return None;
        }
        let entry = self.entries.get(key)?;
        if self.is_fresh(&entry, Utc::now()) {
            return Some(entry.data.clone());
        }
        drop(entry);
        self.entries.remove(key);
        None
    }

    /// Stores `data` and drops every expired entry, so keys that are never
    /// read again do not accumulate.
    pub fn insert(&self, key: String, data: T) {
        if !self.is_enabled() {
            return;
        }
        let now = Utc::now();
        self.entries.retain(|_, entry| self.is_fresh(entry, now));
        self.entries.insert(key, CacheEntry {
            data,
            cached_at: now,
        });
    }

    fn is_fresh(&self, entry: &CacheEntry<T>, now: DateTime<Utc>) -> bool {
        (now - entry.cached_at).num_seconds() < self.ttl_secs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
