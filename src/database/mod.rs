pub mod db;
pub mod db_structs;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use self::db_structs::{Page, PerformanceRecord, Rating, RatingFilter, RatingSort};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Failed to decode column '{column}': {reason}")]
    Corrupt { column: &'static str, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String)
}

/// Supplies a horse's past runs.
#[async_trait]
pub trait PerformanceSource: Send + Sync {
    /// Returns at most `limit` performances, most recent first.
    async fn fetch_recent_performances(&self, horse_id: i32, limit: usize)
        -> Result<Vec<PerformanceRecord>, DatabaseError>;
}

/// Persists ratings. Ratings are never deleted; at most one rating per horse is current.
#[async_trait]
pub trait RatingStore: Send + Sync {
    async fn get_current_rating(&self, horse_id: i32) -> Result<Option<Rating>, DatabaseError>;

    /// Marks the horse's current rating as superseded and inserts `rating`
    /// as the new current one, atomically. Returns the stored rating with its id.
    async fn upsert_current_rating(&self, horse_id: i32, rating: Rating) -> Result<Rating, DatabaseError>;

    async fn list_ratings(
        &self,
        filter: &RatingFilter,
        sort: RatingSort,
        page: Page
    ) -> Result<Vec<Rating>, DatabaseError>;
}
