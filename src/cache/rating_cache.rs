use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc
    },
    time::Duration
};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use strum::EnumCount;
use tracing::{debug, warn};

use super::{
    backend::{CacheBackend, CacheError},
    namespace::{CacheNamespace, CacheTtls},
    pattern::CachePattern
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    /// hits / (hits + misses), 0 before the first lookup
    pub hit_rate: f64,
    pub key_count: usize,
    pub evictions: u64,
    pub backend_errors: u64
}

/// Typed, namespaced cache over a [`CacheBackend`].
///
/// Backend failures are logged and treated as misses; nothing here returns
/// a cache error to the caller. Concurrent misses on one key share a single
/// computation, and a computation that overlaps an invalidation of its
/// namespace is returned but never cached.
pub struct RatingCache {
    backend: Arc<dyn CacheBackend>,
    ttls: CacheTtls,
    in_flight: InFlightRegistry,
    /// Bumped whenever a namespace may have lost entries
    generations: [AtomicU64; CacheNamespace::COUNT],
    hits: AtomicU64,
    misses: AtomicU64,
    backend_errors: AtomicU64
}

impl RatingCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttls: CacheTtls) -> Self {
        RatingCache {
            backend,
            ttls,
            in_flight: Mutex::new(HashMap::new()),
            generations: std::array::from_fn(|_| AtomicU64::new(0)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            backend_errors: AtomicU64::new(0)
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn ttl(&self, namespace: CacheNamespace) -> Duration {
        self.ttls.ttl(namespace)
    }

    pub async fn get<T: DeserializeOwned>(&self, namespace: CacheNamespace, key: &str) -> Option<T> {
        let value = self.fetch(&namespace.key(key)).await;

        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed)
        };

        value
    }

    /// Stores with the namespace ttl.
    pub async fn set<T: Serialize>(&self, namespace: CacheNamespace, key: &str, value: &T) {
        self.set_with_ttl(namespace, key, value, self.ttls.ttl(namespace)).await
    }

    pub async fn set_with_ttl<T: Serialize>(&self, namespace: CacheNamespace, key: &str, value: &T, ttl: Duration) {
        let full_key = namespace.key(key);

        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                self.backend_failure("set", &full_key, &CacheError::from(e));
                return;
            }
        };

        if let Err(e) = self.backend.set(&full_key, bytes, ttl).await {
            self.backend_failure("set", &full_key, &e);
        }
    }

    /// Returns the cached value, or runs `compute` and caches its result
    /// under the namespace ttl.
    ///
    /// Only one `compute` runs per key at a time; callers that missed while
    /// it ran pick up its result. Errors from `compute` are returned as-is
    /// and nothing is cached.
    pub async fn get_or_compute<T, E, F, Fut>(&self, namespace: CacheNamespace, key: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>
    {
        self.get_or_compute_with_ttl(namespace, key, self.ttl(namespace), compute)
            .await
    }

    pub async fn get_or_compute_with_ttl<T, E, F, Fut>(
        &self,
        namespace: CacheNamespace,
        key: &str,
        ttl: Duration,
        compute: F
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>
    {
        if let Some(value) = self.get(namespace, key).await {
            return Ok(value);
        }

        let full_key = namespace.key(key);
        let in_flight = self.acquire_in_flight(&full_key);
        let _permit = in_flight.lock.lock().await;

        if let Some(value) = self.fetch::<T>(&full_key).await {
            debug!(key = %full_key, "Computation shared with concurrent caller");
            return Ok(value);
        }

        self.compute_and_cache(namespace, key, ttl, compute).await
    }

    /// Always runs `compute` and replaces the cached value.
    ///
    /// Waits for any computation already running on the key, but never
    /// adopts its result.
    pub async fn recompute<T, E, F, Fut>(&self, namespace: CacheNamespace, key: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>
    {
        let in_flight = self.acquire_in_flight(&namespace.key(key));
        let _permit = in_flight.lock.lock().await;

        self.compute_and_cache(namespace, key, self.ttl(namespace), compute)
            .await
    }

    pub async fn remove(&self, namespace: CacheNamespace, key: &str) -> bool {
        let full_key = namespace.key(key);
        self.generation(namespace).fetch_add(1, Ordering::SeqCst);

        match self.backend.remove(&full_key).await {
            Ok(removed) => removed,
            Err(e) => {
                self.backend_failure("remove", &full_key, &e);
                false
            }
        }
    }

    /// Removes every key matching `pattern`. Returns the number removed.
    pub async fn invalidate(&self, pattern: &CachePattern) -> usize {
        // A glob can reach any namespace
        self.bump_all_generations();
        self.invalidate_matching(pattern).await
    }

    pub async fn invalidate_horse(&self, horse_id: i32) -> usize {
        self.invalidate(&CachePattern::horse(horse_id)).await
    }

    pub async fn invalidate_namespace(&self, namespace: CacheNamespace) -> usize {
        self.generation(namespace).fetch_add(1, Ordering::SeqCst);
        self.invalidate_matching(&namespace.pattern()).await
    }

    pub async fn clear(&self) -> usize {
        self.bump_all_generations();

        match self.backend.clear().await {
            Ok(removed) => removed,
            Err(e) => {
                self.backend_failure("clear", "*", &e);
                0
            }
        }
    }

    pub async fn metrics(&self) -> CacheMetrics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        let key_count = match self.backend.key_count().await {
            Ok(count) => count,
            Err(e) => {
                self.backend_failure("key_count", "*", &e);
                0
            }
        };

        CacheMetrics {
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            key_count,
            evictions: self.backend.evictions(),
            backend_errors: self.backend_errors.load(Ordering::Relaxed)
        }
    }

    /// Backend read without touching hit/miss counters.
    async fn fetch<T: DeserializeOwned>(&self, full_key: &str) -> Option<T> {
        let bytes = match self.backend.get(full_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                self.backend_failure("get", full_key, &e);
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                self.backend_failure("decode", full_key, &CacheError::from(e));
                // An undecodable entry would miss forever
                let _ = self.backend.remove(full_key).await;
                None
            }
        }
    }

    async fn invalidate_matching(&self, pattern: &CachePattern) -> usize {
        match self.backend.invalidate(pattern).await {
            Ok(removed) => {
                debug!(%pattern, removed, "Invalidated cache entries");
                removed
            }
            Err(e) => {
                self.backend_failure("invalidate", pattern.as_str(), &e);
                0
            }
        }
    }

    /// Runs `compute` and caches the result unless the namespace was
    /// invalidated while it ran.
    async fn compute_and_cache<T, E, F, Fut>(
        &self,
        namespace: CacheNamespace,
        key: &str,
        ttl: Duration,
        compute: F
    ) -> Result<T, E>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>
    {
        let generation = self.generation(namespace).load(Ordering::SeqCst);
        let value = compute().await?;

        if self.generation(namespace).load(Ordering::SeqCst) == generation {
            self.set_with_ttl(namespace, key, &value, ttl).await;
        } else {
            debug!(key = %namespace.key(key), "Invalidated during computation, result not cached");
        }

        Ok(value)
    }

    fn generation(&self, namespace: CacheNamespace) -> &AtomicU64 {
        &self.generations[namespace as usize]
    }

    fn bump_all_generations(&self) {
        for generation in &self.generations {
            generation.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn acquire_in_flight(&self, full_key: &str) -> InFlight<'_> {
        let lock = Arc::clone(
            self.in_flight
                .lock()
                .entry(full_key.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
        );

        InFlight {
            registry: &self.in_flight,
            key: full_key.to_string(),
            lock
        }
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight.lock().len()
    }

    fn backend_failure(&self, operation: &str, key: &str, error: &CacheError) {
        self.backend_errors.fetch_add(1, Ordering::Relaxed);
        warn!(
            backend = self.backend.name(),
            operation,
            key,
            error = %error,
            "Cache operation failed, bypassing cache"
        );
    }
}

type InFlightRegistry = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Claim on a key's computation lock. Dropping the last claim, including
/// through cancellation, removes the key from the registry.
struct InFlight<'a> {
    registry: &'a InFlightRegistry,
    key: String,
    lock: Arc<tokio::sync::Mutex<()>>
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut registry = self.registry.lock();
        // Held by the registry and by this claim only
        let unclaimed = registry
            .get(&self.key)
            .is_some_and(|lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2);

        if unclaimed {
            registry.remove(&self.key);
        }
    }
}
