use std::time::{Duration, Instant};

use bytes::Bytes;

/// A serialized value held by a cache backend.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: Bytes,
    pub created_at: Instant,
    pub ttl: Duration,
    pub hit_count: u64,
    pub last_accessed_at: Instant
}

impl CacheEntry {
    pub fn new(key: String, value: Bytes, ttl: Duration, now: Instant) -> Self {
        CacheEntry {
            key,
            value,
            created_at: now,
            ttl,
            hit_count: 0,
            last_accessed_at: now
        }
    }

    /// Logically absent once its age exceeds the ttl.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) > self.ttl
    }

    pub fn record_hit(&mut self, now: Instant) {
        self.hit_count += 1;
        self.last_accessed_at = now;
    }
}
