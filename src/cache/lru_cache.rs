use dashmap::DashMap;
use std::{
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tracing::debug;

/// Cache entry with its insertion time and last access tick.
#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    last_access: AtomicU64,
}

impl<V> CacheEntry<V> {
    fn new(value: V, tick: u64) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            last_access: AtomicU64::new(tick),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.inserted_at.elapsed() >= ttl)
    }
}

#[derive(Debug, Default)]
struct Counters {
    tick: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_removals: AtomicU64,
}

/// Size-bounded cache with optional time-to-live.
///
/// When an insert pushes the cache past `capacity`, the least recently read
/// entry is dropped. Entries older than the TTL read as misses and are
/// removed lazily, or in bulk by [`cleanup_expired`](Self::cleanup_expired).
/// Clones share the same storage.
#[derive(Debug)]
pub struct LruCache<K: Clone + Eq + Hash, V> {
    data: Arc<DashMap<K, CacheEntry<V>>>,
    counters: Arc<Counters>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl<K, V> LruCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            counters: Arc::new(Counters::default()),
            capacity,
            ttl,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let found = match self.data.get(key) {
            Some(entry) if entry.is_expired(self.ttl) => {
                drop(entry);
                if self.data.remove_if(key, |_, e| e.is_expired(self.ttl)).is_some() {
                    self.counters.expired_removals.fetch_add(1, Ordering::Relaxed);
                }
                None
            }
            Some(entry) => {
                entry.last_access.store(self.next_tick(), Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => None,
        };

        let counter = if found.is_some() { &self.counters.hits } else { &self.counters.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Inserts or replaces `key`, returning the previous value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        let previous = self
            .data
            .insert(key, CacheEntry::new(value, self.next_tick()))
            .map(|old| old.value);

        while self.data.len() > self.capacity {
            if !self.evict_least_recent() {
                break;
            }
        }
        previous
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.data.remove(key).map(|(_, entry)| entry.value)
    }

    pub fn clear(&self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Drops expired entries and returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        let before = self.data.len();
        self.data.retain(|_, entry| !entry.is_expired(self.ttl));
        let removed = before.saturating_sub(self.data.len());

        if removed > 0 {
            self.counters.expired_removals.fetch_add(removed as u64, Ordering::Relaxed);
            debug!("Removed {} expired cache entries", removed);
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.data.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expired_removals: self.counters.expired_removals.load(Ordering::Relaxed),
        }
    }

    fn next_tick(&self) -> u64 {
        self.counters.tick.fetch_add(1, Ordering::Relaxed)
    }

    fn evict_least_recent(&self) -> bool {
        let victim = self
            .data
            .iter()
            .min_by_key(|entry| entry.last_access.load(Ordering::Relaxed))
            .map(|entry| entry.key().clone());

        match victim {
            Some(key) => {
                self.data.remove(&key);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }
}

impl<K, V> Clone for LruCache<K, V>
where
    K: Clone + Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            counters: self.counters.clone(),
            capacity: self.capacity,
            ttl: self.ttl,
        }
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired_removals: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}
