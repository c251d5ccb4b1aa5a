use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant}
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use itertools::Itertools;
use parking_lot::Mutex;
use tracing::debug;

use super::{
    backend::{CacheBackend, CacheError},
    entry::CacheEntry,
    pattern::CachePattern
};

/// Share of entries dropped when the cache is full.
const EVICTION_FRACTION: f64 = 0.1;

/// In-process backend on a sharded concurrent map.
///
/// Reads never take a global lock. Inserts of new keys serialize on
/// `insert_lock` so the entry count can never pass `max_entries`.
pub struct MemoryCacheBackend {
    entries: DashMap<String, CacheEntry>,
    max_entries: usize,
    insert_lock: Mutex<()>,
    evictions: AtomicU64
}

impl MemoryCacheBackend {
    pub fn new(max_entries: usize) -> Self {
        MemoryCacheBackend {
            entries: DashMap::new(),
            max_entries: max_entries.max(1),
            insert_lock: Mutex::new(()),
            evictions: AtomicU64::new(0)
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, key: &str, now: Instant) -> Option<Bytes> {
        {
            let mut entry = self.entries.get_mut(key)?;
            if !entry.is_expired_at(now) {
                entry.record_hit(now);
                return Some(entry.value.clone());
            }
        }

        // The shard guard must be released before removal
        self.entries.remove_if(key, |_, entry| entry.is_expired_at(now));
        None
    }

    fn insert(&self, key: &str, value: Bytes, ttl: Duration, now: Instant) {
        let _guard = self.insert_lock.lock();

        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            let swept = self.sweep_expired(now);
            if self.entries.len() >= self.max_entries {
                self.evict_least_used();
            } else {
                debug!(swept, "Freed cache capacity by dropping expired entries");
            }
        }

        self.entries
            .insert(key.to_string(), CacheEntry::new(key.to_string(), value, ttl, now));
    }

    fn sweep_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));

        before.saturating_sub(self.entries.len())
    }

    /// Drops the least-hit entries, oldest access first on ties.
    fn evict_least_used(&self) {
        let count = ((self.entries.len() as f64 * EVICTION_FRACTION).ceil() as usize).max(1);

        let victims = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.hit_count, entry.last_accessed_at))
            .sorted_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)))
            .take(count)
            .map(|(key, _, _)| key)
            .collect_vec();

        for key in &victims {
            self.entries.remove(key);
        }

        self.evictions.fetch_add(victims.len() as u64, Ordering::Relaxed);
        debug!(evicted = victims.len(), "Evicted least used cache entries");
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(self.lookup(key, Instant::now()))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        self.insert(key, value, ttl, Instant::now());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn invalidate(&self, pattern: &CachePattern) -> Result<usize, CacheError> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !pattern.matches(key));

        Ok(before.saturating_sub(self.entries.len()))
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        let removed = self.entries.len();
        self.entries.clear();

        Ok(removed)
    }

    async fn key_count(&self) -> Result<usize, CacheError> {
        Ok(self.entries.len())
    }

    fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}
