use std::{sync::Arc, time::Duration};

use approx::assert_abs_diff_eq;
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use turf_rating::{
    config::ServiceConfig,
    database::{
        db_structs::{Page, PerformanceRecord, Rating, RatingFilter, RatingSort, RatingSortField, SortDirection},
        memory::{InMemoryPerformanceSource, InMemoryRatingStore},
        DatabaseError, PerformanceSource, RatingStore
    },
    error::RatingError,
    messaging::{PublisherError, RatingCalculatedMessage, RatingEventPublisher},
    model::{
        conversion::ConversionMethod,
        structures::{race_category::RaceCategory, rating_scale::RatingScale, rating_status::RatingStatus}
    },
    service::RatingService,
    utils::test_utils::generate_performance
};

use crate::common::{fixed_clock, group1_wins, init_test_env, test_service, test_service_with};

#[derive(Default)]
struct RecordingPublisher {
    messages: Mutex<Vec<RatingCalculatedMessage>>
}

#[async_trait]
impl RatingEventPublisher for RecordingPublisher {
    async fn publish_rating_calculated(&self, message: &RatingCalculatedMessage) -> Result<(), PublisherError> {
        self.messages.lock().push(message.clone());
        Ok(())
    }
}

struct DisconnectedPublisher;

#[async_trait]
impl RatingEventPublisher for DisconnectedPublisher {
    async fn publish_rating_calculated(&self, _message: &RatingCalculatedMessage) -> Result<(), PublisherError> {
        Err(PublisherError::NotConnected)
    }
}

/// Reads the history, then stalls before handing it back.
struct StallingSource {
    inner: Arc<InMemoryPerformanceSource>,
    stall: Duration
}

#[async_trait]
impl PerformanceSource for StallingSource {
    async fn fetch_recent_performances(
        &self,
        horse_id: i32,
        limit: usize
    ) -> Result<Vec<PerformanceRecord>, DatabaseError> {
        let performances = self.inner.fetch_recent_performances(horse_id, limit).await?;
        tokio::time::sleep(self.stall).await;
        Ok(performances)
    }
}

/// Lists ratings, then stalls before handing them back.
struct StallingStore {
    inner: Arc<InMemoryRatingStore>,
    stall: Duration
}

#[async_trait]
impl RatingStore for StallingStore {
    async fn get_current_rating(&self, horse_id: i32) -> Result<Option<Rating>, DatabaseError> {
        self.inner.get_current_rating(horse_id).await
    }

    async fn upsert_current_rating(&self, horse_id: i32, rating: Rating) -> Result<Rating, DatabaseError> {
        self.inner.upsert_current_rating(horse_id, rating).await
    }

    async fn list_ratings(
        &self,
        filter: &RatingFilter,
        sort: RatingSort,
        page: Page
    ) -> Result<Vec<Rating>, DatabaseError> {
        let ratings = self.inner.list_ratings(filter, sort, page).await?;
        tokio::time::sleep(self.stall).await;
        Ok(ratings)
    }
}

#[tokio::test]
async fn test_three_group1_wins() {
    let ctx = test_service();
    ctx.source.insert(123, group1_wins(3));

    let rating = ctx.service.calculate_rating(123).await.unwrap();

    assert!(rating.local_rating >= 80.0, "rating was {}", rating.local_rating);
    assert!(rating.confidence >= 70.0, "confidence was {}", rating.confidence);
    assert_eq!(rating.status, RatingStatus::Calculated);
    assert!(rating.is_current);
    assert_eq!(rating.international_conversions.len(), 4);
}

#[tokio::test]
async fn test_no_performance_data() {
    let ctx = test_service();

    let result = ctx.service.calculate_rating(404).await;

    let error = result.unwrap_err();
    assert!(matches!(error, RatingError::NoPerformanceData { horse_id: 404 }));
    assert_eq!(error.code(), "NO_PERFORMANCE_DATA");
    assert!(ctx.store.all_ratings().is_empty());
}

#[tokio::test]
async fn test_invalid_performance_is_client_error() {
    let ctx = test_service();
    let mut performances = group1_wins(3);
    performances[0].position = 0;
    ctx.source.insert(1, performances);

    let error = ctx.service.calculate_rating(1).await.unwrap_err();

    assert!(error.is_client_error());
    assert_eq!(error.payload().code, "INVALID_PERFORMANCE_INPUT");
}

#[tokio::test]
async fn test_provisional_rating() {
    let ctx = test_service();
    ctx.source.insert(2, group1_wins(1));

    let rating = ctx.service.calculate_rating(2).await.unwrap();

    assert_eq!(rating.status, RatingStatus::Provisional);
    assert!(rating.confidence < 30.0);
}

#[tokio::test]
async fn test_convert_without_matching_band() {
    let ctx = test_service();

    let result = ctx.service.convert_rating(85.0, "ifha").await.unwrap();

    assert_eq!(result.scale, RatingScale::Ifha);
    assert_abs_diff_eq!(result.converted, 72.3, epsilon = 0.1);
    assert_eq!(result.method, ConversionMethod::Coefficient);
}

#[tokio::test]
async fn test_convert_rejects_non_finite_value() {
    let ctx = test_service();

    for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let error = ctx.service.convert_rating(value, "uk").await.unwrap_err();

        assert!(matches!(error, RatingError::InvalidRatingValue(_)));
        assert_eq!(error.code(), "INVALID_RATING_VALUE");
        assert!(error.is_client_error());
    }

    let metrics = ctx.service.get_cache_metrics().await;
    assert_eq!(metrics.key_count, 0);
    assert_eq!(metrics.backend_errors, 0);
}

#[tokio::test]
async fn test_convert_unknown_scale() {
    let ctx = test_service();

    let error = ctx.service.convert_rating(85.0, "jra").await.unwrap_err();

    assert!(matches!(&error, RatingError::UnknownScale(scale) if scale == "jra"));
    assert!(error.is_client_error());
}

#[tokio::test]
async fn test_second_call_is_served_from_cache() {
    let ctx = test_service();
    ctx.source.insert(5, group1_wins(4));

    let first = ctx.service.calculate_rating(5).await.unwrap();
    let second = ctx.service.calculate_rating(5).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(ctx.store.all_ratings().len(), 1);

    let metrics = ctx.service.get_cache_metrics().await;
    assert_eq!(metrics.hits, 1);
    assert!(metrics.key_count >= 1);
}

#[tokio::test]
async fn test_deterministic_for_fixed_clock() {
    let ctx = test_service();
    ctx.source.insert(6, group1_wins(5));

    let first = ctx.service.calculate_rating(6).await.unwrap();
    ctx.service.on_new_race_result(6).await.unwrap();
    let current = ctx.store.get_current_rating(6).await.unwrap().unwrap();

    assert_eq!(first.local_rating, current.local_rating);
    assert_eq!(first.confidence, current.confidence);
    assert_ne!(first.id, current.id);
}

#[tokio::test]
async fn test_concurrent_misses_compute_once() {
    let ctx = test_service_with(
        InMemoryPerformanceSource::with_latency(Duration::from_millis(30)),
        ServiceConfig::default()
    );
    ctx.source.insert(7, group1_wins(3));

    let results = join_all((0..16).map(|_| ctx.service.calculate_rating(7))).await;

    let ids: Vec<i32> = results.into_iter().map(|r| r.unwrap().id).collect();
    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(ctx.store.all_ratings().len(), 1);
    assert_eq!(ctx.store.current_count(7), 1);
}

#[tokio::test]
async fn test_one_current_rating_after_concurrent_recalculations() {
    let ctx = test_service();
    for horse_id in 1..=4 {
        ctx.source.insert(horse_id, group1_wins(3));
    }

    let calls = (0..20).map(|i| ctx.service.on_new_race_result(i % 4 + 1));
    for result in join_all(calls).await {
        result.unwrap();
    }

    for horse_id in 1..=4 {
        assert_eq!(ctx.store.current_count(horse_id), 1);
    }
}

#[tokio::test]
async fn test_source_timeout() {
    let config = ServiceConfig {
        source_timeout: Duration::from_millis(50),
        ..ServiceConfig::default()
    };
    let ctx = test_service_with(InMemoryPerformanceSource::with_latency(Duration::from_millis(500)), config);
    ctx.source.insert(8, group1_wins(3));

    let error = ctx.service.calculate_rating(8).await.unwrap_err();

    assert!(matches!(
        error,
        RatingError::ComputationTimeout {
            operation: "fetch_recent_performances",
            ..
        }
    ));
    assert!(ctx.store.all_ratings().is_empty());
}

#[tokio::test]
async fn test_persistence_failure_keeps_previous_rating() {
    let ctx = test_service();
    ctx.source.insert(9, group1_wins(3));
    let original = ctx.service.calculate_rating(9).await.unwrap();

    ctx.store.set_fail_writes(true);
    ctx.source
        .record_result(9, generate_performance(12, RaceCategory::Unclassified, "2026-09-30"));
    let error = ctx.service.on_new_race_result(9).await.unwrap_err();

    assert!(matches!(error, RatingError::Persistence(_)));
    assert_eq!(error.code(), "RATING_PERSISTENCE_ERROR");

    let current = ctx.store.get_current_rating(9).await.unwrap().unwrap();
    assert_eq!(current.id, original.id);
    assert_eq!(ctx.store.current_count(9), 1);

    // Failed computations are not cached
    ctx.store.set_fail_writes(false);
    let retried = ctx.service.calculate_rating(9).await.unwrap();
    assert_ne!(retried.id, original.id);
}

#[tokio::test]
async fn test_new_race_result_supersedes() {
    let ctx = test_service();
    ctx.source.insert(10, group1_wins(3));
    let before = ctx.service.calculate_rating(10).await.unwrap();

    ctx.source
        .record_result(10, generate_performance(11, RaceCategory::Class2, "2026-09-30"));
    let after = ctx.service.on_new_race_result(10).await.unwrap();

    assert_eq!(after.races_analyzed, 4);
    assert!(after.local_rating < before.local_rating);

    let history = ctx.service.rating_history(10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, after.id);
    assert!(history[0].is_current);
    assert_eq!(history[1].status, RatingStatus::Superseded);
    assert!(!history[1].is_current);
}

#[tokio::test]
async fn test_statistics_follow_new_ratings() {
    let ctx = test_service();
    ctx.source.insert(1, group1_wins(3));
    ctx.source.insert(2, group1_wins(4));

    ctx.service.calculate_rating(1).await.unwrap();
    let first = ctx.service.get_statistics().await.unwrap();
    assert_eq!(first.total_rated, 1);

    ctx.service.calculate_rating(2).await.unwrap();
    let second = ctx.service.get_statistics().await.unwrap();
    assert_eq!(second.total_rated, 2);
    assert_eq!(second.distribution.values().sum::<u64>(), 2);
}

#[tokio::test]
async fn test_statistics_exclude_superseded() {
    let ctx = test_service();
    ctx.source.insert(3, group1_wins(3));

    ctx.service.calculate_rating(3).await.unwrap();
    ctx.service.on_new_race_result(3).await.unwrap();
    let statistics = ctx.service.get_statistics().await.unwrap();

    assert_eq!(ctx.store.all_ratings().len(), 2);
    assert_eq!(statistics.total_rated, 1);
}

#[tokio::test]
async fn test_list_current_ratings_sorted() {
    let ctx = test_service();
    ctx.source.insert(1, group1_wins(3));
    ctx.source.insert(2, vec![generate_performance(9, RaceCategory::Unclassified, "2026-09-20")]);
    ctx.service.calculate_rating(1).await.unwrap();
    ctx.service.calculate_rating(2).await.unwrap();

    let sort = RatingSort {
        field: RatingSortField::LocalRating,
        direction: SortDirection::Descending
    };
    let ratings = ctx
        .service
        .list_ratings(&RatingFilter::current(), sort, Page::default())
        .await
        .unwrap();

    assert_eq!(ratings.iter().map(|r| r.horse_id).collect::<Vec<_>>(), vec![1, 2]);

    let second_page = ctx
        .service
        .list_ratings(&RatingFilter::current(), sort, Page::new(1, 1))
        .await
        .unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].horse_id, 2);
}

#[tokio::test]
async fn test_publishes_stored_ratings() {
    let publisher = Arc::new(RecordingPublisher::default());
    let ctx = test_service();
    let service = ctx.service.with_publisher(publisher.clone());
    ctx.source.insert(11, group1_wins(3));

    let rating = service.calculate_rating(11).await.unwrap();
    // Cached: nothing new stored, nothing published
    service.calculate_rating(11).await.unwrap();

    let messages = publisher.messages.lock().clone();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].horse_id, 11);
    assert_eq!(messages[0].rating_id, rating.id);
}

#[tokio::test]
async fn test_publish_failure_is_not_surfaced() {
    let ctx = test_service();
    let service = ctx.service.with_publisher(Arc::new(DisconnectedPublisher));
    ctx.source.insert(12, group1_wins(3));

    assert!(service.calculate_rating(12).await.is_ok());
    assert_eq!(ctx.store.current_count(12), 1);
}

#[tokio::test]
async fn test_monitor_tracks_operations() {
    let ctx = test_service();
    ctx.source.insert(13, group1_wins(3));

    ctx.service.calculate_rating(13).await.unwrap();
    ctx.service.calculate_rating(404).await.unwrap_err();
    ctx.service.convert_rating(90.0, "uk").await.unwrap();

    let summary = ctx.service.monitor_summary();
    assert_eq!(summary["calculate_rating"].count, 2);
    assert_eq!(summary["calculate_rating"].failures, 1);
    assert_eq!(summary["convert_rating"].successes, 1);
}

#[tokio::test]
async fn test_new_result_during_running_calculation() {
    init_test_env();
    let inner = Arc::new(InMemoryPerformanceSource::new());
    inner.insert(14, group1_wins(3));
    let source = Arc::new(StallingSource {
        inner: inner.clone(),
        stall: Duration::from_millis(100)
    });
    let store = Arc::new(InMemoryRatingStore::new());
    let service = RatingService::new(source, store.clone(), ServiceConfig::default()).with_clock(fixed_clock);

    let running = service.calculate_rating(14);
    let new_result = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        inner.record_result(14, generate_performance(2, RaceCategory::Group1, "2026-09-30"));
        service.on_new_race_result(14).await
    };

    let (stale, fresh) = tokio::join!(running, new_result);

    assert_eq!(stale.unwrap().races_analyzed, 3);
    let fresh = fresh.unwrap();
    assert_eq!(fresh.races_analyzed, 4);

    let current = store.get_current_rating(14).await.unwrap().unwrap();
    assert_eq!(current.id, fresh.id);
    assert_eq!(store.current_count(14), 1);

    let cached = service.calculate_rating(14).await.unwrap();
    assert_eq!(cached.id, fresh.id);
}

#[tokio::test]
async fn test_statistics_scan_overlapping_new_rating_is_not_cached() {
    init_test_env();
    let source = Arc::new(InMemoryPerformanceSource::new());
    source.insert(15, group1_wins(3));
    let inner = Arc::new(InMemoryRatingStore::new());
    let store = Arc::new(StallingStore {
        inner: inner.clone(),
        stall: Duration::from_millis(100)
    });
    let service = RatingService::new(source, store, ServiceConfig::default()).with_clock(fixed_clock);

    let scan = service.get_statistics();
    let new_rating = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        service.calculate_rating(15).await
    };

    let (during, rating) = tokio::join!(scan, new_rating);

    assert_eq!(during.unwrap().total_rated, 0);
    rating.unwrap();
    assert_eq!(inner.current_count(15), 1);

    let after = service.get_statistics().await.unwrap();
    assert_eq!(after.total_rated, 1);

    let listed = service
        .list_ratings(&RatingFilter::current(), RatingSort::default(), Page::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}
