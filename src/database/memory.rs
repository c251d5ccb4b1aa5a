use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicI32, Ordering as AtomicOrdering},
    time::Duration
};

use async_trait::async_trait;
use itertools::Itertools;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{
    db_structs::{Page, PerformanceRecord, Rating, RatingFilter, RatingSort, RatingSortField, SortDirection},
    DatabaseError, PerformanceSource, RatingStore
};

/// Performance source backed by a map, with an optional artificial latency.
#[derive(Default)]
pub struct InMemoryPerformanceSource {
    performances: RwLock<HashMap<i32, Vec<PerformanceRecord>>>,
    latency: Option<Duration>
}

impl InMemoryPerformanceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        InMemoryPerformanceSource {
            performances: RwLock::new(HashMap::new()),
            latency: Some(latency)
        }
    }

    /// Replaces the horse's history. `performances` must be most recent first.
    pub fn insert(&self, horse_id: i32, performances: Vec<PerformanceRecord>) {
        self.performances.write().insert(horse_id, performances);
    }

    /// Prepends a new race result.
    pub fn record_result(&self, horse_id: i32, performance: PerformanceRecord) {
        self.performances
            .write()
            .entry(horse_id)
            .or_default()
            .insert(0, performance);
    }
}

#[async_trait]
impl PerformanceSource for InMemoryPerformanceSource {
    async fn fetch_recent_performances(
        &self,
        horse_id: i32,
        limit: usize
    ) -> Result<Vec<PerformanceRecord>, DatabaseError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let performances = self.performances.read();
        Ok(performances
            .get(&horse_id)
            .map(|p| p.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Append-only rating store kept in memory.
///
/// Supersession happens under a single lock, so readers never observe
/// zero or two current ratings for a horse.
pub struct InMemoryRatingStore {
    ratings: Mutex<Vec<Rating>>,
    next_id: AtomicI32,
    fail_writes: AtomicBool
}

impl Default for InMemoryRatingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRatingStore {
    pub fn new() -> Self {
        InMemoryRatingStore {
            ratings: Mutex::new(Vec::new()),
            next_id: AtomicI32::new(1),
            fail_writes: AtomicBool::new(false)
        }
    }

    /// Makes every subsequent upsert fail before anything is written.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, AtomicOrdering::SeqCst);
    }

    pub fn all_ratings(&self) -> Vec<Rating> {
        self.ratings.lock().clone()
    }

    pub fn current_count(&self, horse_id: i32) -> usize {
        self.ratings
            .lock()
            .iter()
            .filter(|r| r.horse_id == horse_id && r.is_current)
            .count()
    }
}

#[async_trait]
impl RatingStore for InMemoryRatingStore {
    async fn get_current_rating(&self, horse_id: i32) -> Result<Option<Rating>, DatabaseError> {
        Ok(self
            .ratings
            .lock()
            .iter()
            .find(|r| r.horse_id == horse_id && r.is_current)
            .cloned())
    }

    async fn upsert_current_rating(&self, horse_id: i32, mut rating: Rating) -> Result<Rating, DatabaseError> {
        if self.fail_writes.load(AtomicOrdering::SeqCst) {
            return Err(DatabaseError::Unavailable("writes are disabled".to_string()));
        }

        let mut ratings = self.ratings.lock();
        let mut superseded = 0;
        for existing in ratings.iter_mut().filter(|r| r.horse_id == horse_id && r.is_current) {
            existing.supersede();
            superseded += 1;
        }

        rating.id = self.next_id.fetch_add(1, AtomicOrdering::SeqCst);
        rating.horse_id = horse_id;
        rating.is_current = true;
        ratings.push(rating.clone());

        debug!(horse_id, rating_id = rating.id, superseded, "Stored current rating");
        Ok(rating)
    }

    async fn list_ratings(
        &self,
        filter: &RatingFilter,
        sort: RatingSort,
        page: Page
    ) -> Result<Vec<Rating>, DatabaseError> {
        let ratings = self.ratings.lock();

        Ok(ratings
            .iter()
            .filter(|r| filter.matches(r))
            .sorted_by(|a, b| compare(a, b, sort))
            .skip(page.offset() as usize)
            .take(page.size as usize)
            .cloned()
            .collect())
    }
}

fn compare(a: &Rating, b: &Rating, sort: RatingSort) -> Ordering {
    let ordering = match sort.field {
        RatingSortField::LocalRating => a.local_rating.total_cmp(&b.local_rating),
        RatingSortField::Confidence => a.confidence.total_cmp(&b.confidence),
        RatingSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        RatingSortField::Id => Ordering::Equal
    }
    .then(a.id.cmp(&b.id));

    match sort.direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse()
    }
}
