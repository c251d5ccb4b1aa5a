use std::{future::Future, str::FromStr, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{info, warn};

use crate::{
    cache::{CacheBackend, CacheMetrics, CacheNamespace, CachePattern, MemoryCacheBackend, PassThroughBackend, RatingCache},
    config::ServiceConfig,
    database::{
        db_structs::{Page, Rating, RatingFilter, RatingSort, RatingSortField, SortDirection},
        PerformanceSource, RatingStore
    },
    error::RatingError,
    messaging::{RatingCalculatedMessage, RatingEventPublisher},
    model::{
        calculator::RatingCalculator,
        conversion::{ConversionResult, ScaleConverter},
        statistics::{Statistics, StatisticsAggregator},
        structures::{performance_order::PerformanceOrder, rating_scale::RatingScale}
    },
    monitor::{OperationSummary, PerformanceMonitor}
};

const STATISTICS_KEY: &str = "summary";
const HISTORY_PAGE_SIZE: u32 = 200;

/// What to drop from the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidationTarget {
    /// Every entry keyed under `horse:{id}:`
    Horse(i32),
    Namespace(CacheNamespace),
    /// Glob such as `horse:12*`
    Pattern(String),
    All
}

impl InvalidationTarget {
    /// Accepts a horse id, a namespace name or a glob pattern.
    pub fn parse(raw: &str) -> InvalidationTarget {
        if let Ok(horse_id) = raw.parse::<i32>() {
            return InvalidationTarget::Horse(horse_id);
        }
        if raw == "*" {
            return InvalidationTarget::All;
        }

        match CacheNamespace::from_str(raw) {
            Ok(namespace) => InvalidationTarget::Namespace(namespace),
            Err(_) => InvalidationTarget::Pattern(raw.to_string())
        }
    }
}

fn rating_key(horse_id: i32) -> String {
    format!("horse:{horse_id}:rating")
}

fn history_key(horse_id: i32) -> String {
    format!("horse:{horse_id}:history")
}

/// Entry point for rating, conversion, statistics and cache administration.
///
/// One instance owns the cache and the monitor; collaborators are injected.
pub struct RatingService {
    source: Arc<dyn PerformanceSource>,
    store: Arc<dyn RatingStore>,
    calculator: RatingCalculator,
    converter: ScaleConverter,
    statistics: StatisticsAggregator,
    cache: RatingCache,
    monitor: PerformanceMonitor,
    publisher: Option<Arc<dyn RatingEventPublisher>>,
    config: ServiceConfig,
    clock: fn() -> DateTime<Utc>
}

impl RatingService {
    pub fn new(source: Arc<dyn PerformanceSource>, store: Arc<dyn RatingStore>, config: ServiceConfig) -> Self {
        let backend: Arc<dyn CacheBackend> = if config.cache_enabled {
            Arc::new(MemoryCacheBackend::new(config.cache_max_entries))
        } else {
            Arc::new(PassThroughBackend)
        };

        RatingService {
            statistics: StatisticsAggregator::new(store.clone()),
            cache: RatingCache::new(backend, config.cache_ttls),
            monitor: PerformanceMonitor::new(config.monitor_sample_capacity, config.monitor_slow_threshold),
            source,
            store,
            calculator: RatingCalculator::default(),
            converter: ScaleConverter::default(),
            publisher: None,
            config,
            clock: Utc::now
        }
    }

    pub fn with_calculator(mut self, calculator: RatingCalculator) -> Self {
        self.calculator = calculator;
        self
    }

    pub fn with_converter(mut self, converter: ScaleConverter) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_cache_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.cache = RatingCache::new(backend, self.config.cache_ttls);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn RatingEventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Replaces the clock used as the reference instant for recency.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    /// Returns the horse's rating, computing and storing a new current
    /// rating when none is cached.
    pub async fn calculate_rating(&self, horse_id: i32) -> Result<Rating, RatingError> {
        self.monitor
            .track(
                "calculate_rating",
                self.cache
                    .get_or_compute(CacheNamespace::Ratings, &rating_key(horse_id), || {
                        self.compute_and_store(horse_id)
                    })
            )
            .await
    }

    /// Drops everything cached for the horse and recalculates it.
    ///
    /// A calculation already running for the horse may predate the new
    /// result, so it is waited for but never reused.
    pub async fn on_new_race_result(&self, horse_id: i32) -> Result<Rating, RatingError> {
        let removed = self.cache.invalidate_horse(horse_id).await
            + self.cache.invalidate_namespace(CacheNamespace::Statistics).await;
        info!(horse_id, removed, "New race result, recalculating");

        self.monitor
            .track(
                "calculate_rating",
                self.cache
                    .recompute(CacheNamespace::Ratings, &rating_key(horse_id), || {
                        self.compute_and_store(horse_id)
                    })
            )
            .await
    }

    pub async fn convert_rating(&self, local_rating: f64, scale: &str) -> Result<ConversionResult, RatingError> {
        self.monitor
            .track("convert_rating", async {
                if !local_rating.is_finite() {
                    return Err(RatingError::InvalidRatingValue(local_rating));
                }
                let scale =
                    RatingScale::from_str(scale).map_err(|_| RatingError::UnknownScale(scale.to_string()))?;
                let key = format!("conversion:{scale}:{local_rating}");

                self.cache
                    .get_or_compute(CacheNamespace::Conversions, &key, || async {
                        Ok::<_, RatingError>(self.converter.convert(local_rating, scale))
                    })
                    .await
            })
            .await
    }

    pub async fn get_statistics(&self) -> Result<Statistics, RatingError> {
        self.monitor
            .track(
                "get_statistics",
                self.cache
                    .get_or_compute(CacheNamespace::Statistics, STATISTICS_KEY, || async {
                        with_timeout("compute_statistics", self.config.store_timeout, self.statistics.compute())
                            .await?
                            .map_err(RatingError::Persistence)
                    })
            )
            .await
    }

    /// Every rating ever stored for the horse, newest first.
    pub async fn rating_history(&self, horse_id: i32) -> Result<Vec<Rating>, RatingError> {
        let sort = RatingSort {
            field: RatingSortField::CreatedAt,
            direction: SortDirection::Descending
        };

        self.monitor
            .track(
                "rating_history",
                self.cache
                    .get_or_compute(CacheNamespace::Lists, &history_key(horse_id), || async {
                        let filter = RatingFilter::for_horse(horse_id);
                        let mut history = Vec::new();
                        let mut number = 0;

                        loop {
                            let page = self.list_from_store(&filter, sort, Page::new(number, HISTORY_PAGE_SIZE)).await?;
                            let fetched = page.len();
                            history.extend(page);

                            if fetched < HISTORY_PAGE_SIZE as usize {
                                break;
                            }
                            number += 1;
                        }

                        Ok::<_, RatingError>(history)
                    })
            )
            .await
    }

    pub async fn list_ratings(
        &self,
        filter: &RatingFilter,
        sort: RatingSort,
        page: Page
    ) -> Result<Vec<Rating>, RatingError> {
        let key = format!("query:{filter:?}:{sort:?}:{page:?}");

        self.monitor
            .track(
                "list_ratings",
                self.cache
                    .get_or_compute(CacheNamespace::Lists, &key, || self.list_from_store(filter, sort, page))
            )
            .await
    }

    /// Never fails; backend errors count as nothing removed.
    pub async fn invalidate_cache(&self, target: InvalidationTarget) -> usize {
        let removed = match &target {
            InvalidationTarget::Horse(horse_id) => self.cache.invalidate_horse(*horse_id).await,
            InvalidationTarget::Namespace(namespace) => self.cache.invalidate_namespace(*namespace).await,
            InvalidationTarget::Pattern(raw) => match CachePattern::new(raw) {
                Ok(pattern) => self.cache.invalidate(&pattern).await,
                Err(e) => {
                    warn!(pattern = %raw, error = %e, "Ignoring invalid cache pattern");
                    0
                }
            },
            InvalidationTarget::All => self.cache.clear().await
        };

        info!(?target, removed, "Cache invalidated");
        removed
    }

    pub async fn get_cache_metrics(&self) -> CacheMetrics {
        self.cache.metrics().await
    }

    pub fn monitor_summary(&self) -> IndexMap<&'static str, OperationSummary> {
        self.monitor.summary()
    }

    async fn compute_and_store(&self, horse_id: i32) -> Result<Rating, RatingError> {
        let performances = with_timeout(
            "fetch_recent_performances",
            self.config.source_timeout,
            self.source.fetch_recent_performances(horse_id, self.config.performance_limit)
        )
        .await?
        .map_err(RatingError::PerformanceSource)?;

        let mut rating = self.calculator.calculate_as_of(
            horse_id,
            &performances,
            PerformanceOrder::MostRecentFirst,
            (self.clock)()
        )?;
        rating.international_conversions = self.converter.convert_all(rating.local_rating);

        let stored = with_timeout(
            "upsert_current_rating",
            self.config.store_timeout,
            self.store.upsert_current_rating(horse_id, rating)
        )
        .await?
        .map_err(RatingError::Persistence)?;

        // Any new current rating changes statistics and listings
        self.cache.invalidate_namespace(CacheNamespace::Statistics).await;
        self.cache.invalidate_namespace(CacheNamespace::Lists).await;

        info!(
            horse_id,
            rating_id = stored.id,
            local_rating = stored.local_rating,
            confidence = stored.confidence,
            status = ?stored.status,
            "Stored current rating"
        );

        self.publish(&stored).await;
        Ok(stored)
    }

    async fn list_from_store(
        &self,
        filter: &RatingFilter,
        sort: RatingSort,
        page: Page
    ) -> Result<Vec<Rating>, RatingError> {
        with_timeout("list_ratings", self.config.store_timeout, self.store.list_ratings(filter, sort, page))
            .await?
            .map_err(RatingError::Persistence)
    }

    async fn publish(&self, rating: &Rating) {
        let Some(publisher) = &self.publisher else {
            return;
        };

        let message = RatingCalculatedMessage::from_rating(rating, None);
        if let Err(e) = publisher.publish_rating_calculated(&message).await {
            warn!(horse_id = rating.horse_id, error = %e, "Failed to publish rating calculated message");
        }
    }
}

async fn with_timeout<T>(
    operation: &'static str,
    timeout: Duration,
    future: impl Future<Output = T>
) -> Result<T, RatingError> {
    tokio::time::timeout(timeout, future)
        .await
        .map_err(|_| RatingError::ComputationTimeout { operation, timeout })
}
