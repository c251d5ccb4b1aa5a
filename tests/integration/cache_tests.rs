use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bytes::Bytes;
use turf_rating::{
    cache::{CacheBackend, CacheError, CacheNamespace, CachePattern, CacheTtls},
    config::ServiceConfig,
    database::memory::InMemoryPerformanceSource,
    service::InvalidationTarget
};

use crate::common::{group1_wins, test_service, test_service_with};

/// A networked backend whose server is gone.
struct UnreachableBackend;

#[async_trait]
impl CacheBackend for UnreachableBackend {
    fn name(&self) -> &'static str {
        "unreachable"
    }

    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Err(CacheError::Unavailable("connection reset".to_string()))
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection reset".to_string()))
    }

    async fn remove(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("connection reset".to_string()))
    }

    async fn invalidate(&self, _pattern: &CachePattern) -> Result<usize, CacheError> {
        Err(CacheError::Unavailable("connection reset".to_string()))
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        Err(CacheError::Unavailable("connection reset".to_string()))
    }

    async fn key_count(&self) -> Result<usize, CacheError> {
        Err(CacheError::Unavailable("connection reset".to_string()))
    }
}

#[tokio::test]
async fn test_invalidate_horse_pattern() {
    let ctx = test_service();
    ctx.source.insert(123, group1_wins(3));
    ctx.source.insert(124, group1_wins(3));

    ctx.service.calculate_rating(123).await.unwrap();
    ctx.service.calculate_rating(124).await.unwrap();
    ctx.service.rating_history(123).await.unwrap();
    ctx.service.convert_rating(85.0, "uk").await.unwrap();
    assert_eq!(ctx.service.get_cache_metrics().await.key_count, 4);

    let removed = ctx
        .service
        .invalidate_cache(InvalidationTarget::parse("horse:123:*"))
        .await;

    assert_eq!(removed, 2);
    assert_eq!(ctx.service.get_cache_metrics().await.key_count, 2);

    // horse 124 is still served from cache
    ctx.service.calculate_rating(124).await.unwrap();
    assert_eq!(ctx.store.all_ratings().len(), 2);

    // horse 123 is recomputed
    ctx.service.calculate_rating(123).await.unwrap();
    assert_eq!(ctx.store.all_ratings().len(), 3);
}

#[tokio::test]
async fn test_invalidate_by_horse_id() {
    let ctx = test_service();
    ctx.source.insert(12, group1_wins(3));
    ctx.source.insert(123, group1_wins(3));
    ctx.service.calculate_rating(12).await.unwrap();
    ctx.service.calculate_rating(123).await.unwrap();

    let removed = ctx.service.invalidate_cache(InvalidationTarget::Horse(12)).await;

    // horse:12: is not a prefix of horse:123:
    assert_eq!(removed, 1);
    assert_eq!(ctx.service.get_cache_metrics().await.key_count, 1);
}

#[tokio::test]
async fn test_invalidate_namespace() {
    let ctx = test_service();
    ctx.service.convert_rating(85.0, "uk").await.unwrap();
    ctx.service.convert_rating(85.0, "france").await.unwrap();
    ctx.service.get_statistics().await.unwrap();

    let removed = ctx
        .service
        .invalidate_cache(InvalidationTarget::Namespace(CacheNamespace::Conversions))
        .await;

    assert_eq!(removed, 2);
    assert_eq!(ctx.service.get_cache_metrics().await.key_count, 1);
}

#[tokio::test]
async fn test_invalid_pattern_removes_nothing() {
    let ctx = test_service();
    ctx.service.convert_rating(85.0, "uk").await.unwrap();

    let removed = ctx.service.invalidate_cache(InvalidationTarget::parse("horse:[")).await;

    assert_eq!(removed, 0);
    assert_eq!(ctx.service.get_cache_metrics().await.key_count, 1);
}

#[tokio::test]
async fn test_clear_all() {
    let ctx = test_service();
    ctx.source.insert(1, group1_wins(3));
    ctx.service.calculate_rating(1).await.unwrap();
    ctx.service.convert_rating(70.0, "uae").await.unwrap();

    let removed = ctx.service.invalidate_cache(InvalidationTarget::All).await;

    assert_eq!(removed, 2);
    assert_eq!(ctx.service.get_cache_metrics().await.key_count, 0);
}

#[tokio::test]
async fn test_unavailable_backend_degrades_to_direct_computation() {
    let ctx = test_service();
    let service = ctx.service.with_cache_backend(Arc::new(UnreachableBackend));
    ctx.source.insert(20, group1_wins(3));

    let first = service.calculate_rating(20).await.unwrap();
    let second = service.calculate_rating(20).await.unwrap();
    let conversion = service.convert_rating(85.0, "ifha").await;

    assert_ne!(first.id, second.id);
    assert_eq!(ctx.store.current_count(20), 1);
    assert!(conversion.is_ok());
    assert_eq!(service.invalidate_cache(InvalidationTarget::All).await, 0);

    let metrics = service.get_cache_metrics().await;
    assert_eq!(metrics.hits, 0);
    assert_eq!(metrics.key_count, 0);
    assert!(metrics.backend_errors > 0);
}

#[tokio::test]
async fn test_disabled_cache_always_computes() {
    let config = ServiceConfig {
        cache_enabled: false,
        ..ServiceConfig::default()
    };
    let ctx = test_service_with(InMemoryPerformanceSource::new(), config);
    ctx.source.insert(21, group1_wins(3));

    ctx.service.calculate_rating(21).await.unwrap();
    ctx.service.calculate_rating(21).await.unwrap();

    assert_eq!(ctx.store.all_ratings().len(), 2);
    assert_eq!(ctx.store.current_count(21), 1);
    assert_eq!(ctx.service.get_cache_metrics().await.hits, 0);
}

#[tokio::test]
async fn test_ratings_expire_after_ttl() {
    let config = ServiceConfig {
        cache_ttls: CacheTtls {
            ratings: Duration::from_millis(200),
            ..CacheTtls::default()
        },
        ..ServiceConfig::default()
    };
    let ctx = test_service_with(InMemoryPerformanceSource::new(), config);
    ctx.source.insert(22, group1_wins(3));

    let first = ctx.service.calculate_rating(22).await.unwrap();
    let cached = ctx.service.calculate_rating(22).await.unwrap();
    assert_eq!(first.id, cached.id);

    tokio::time::sleep(Duration::from_millis(300)).await;
    let refreshed = ctx.service.calculate_rating(22).await.unwrap();

    assert_ne!(first.id, refreshed.id);
    assert_eq!(ctx.store.current_count(22), 1);
}

#[tokio::test]
async fn test_cache_stays_bounded() {
    let config = ServiceConfig {
        cache_max_entries: 10,
        ..ServiceConfig::default()
    };
    let ctx = test_service_with(InMemoryPerformanceSource::new(), config);

    for value in 0..50 {
        ctx.service.convert_rating(40.0 + value as f64, "ifha").await.unwrap();
        assert!(ctx.service.get_cache_metrics().await.key_count <= 10);
    }

    assert!(ctx.service.get_cache_metrics().await.evictions > 0);
}
