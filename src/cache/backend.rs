use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use super::pattern::CachePattern;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("Cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error)
}

/// Storage behind [`RatingCache`](super::rating_cache::RatingCache).
///
/// Keys arrive fully qualified (`namespace:key`). Implementations expire
/// entries lazily and enforce their own capacity bound.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    /// Returns whether the key was present.
    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every key matching `pattern`, returning how many were removed.
    async fn invalidate(&self, pattern: &CachePattern) -> Result<usize, CacheError>;

    async fn clear(&self) -> Result<usize, CacheError>;

    async fn key_count(&self) -> Result<usize, CacheError>;

    /// Entries removed to make room, since creation.
    fn evictions(&self) -> u64 {
        0
    }
}

/// Stores nothing. Used when caching is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughBackend;

#[async_trait]
impl CacheBackend for PassThroughBackend {
    fn name(&self) -> &'static str {
        "pass-through"
    }

    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn invalidate(&self, _pattern: &CachePattern) -> Result<usize, CacheError> {
        Ok(0)
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        Ok(0)
    }

    async fn key_count(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
}
