use super::{
    db_structs::{
        Opponent, Page, PerformanceRecord, Rating, RatingAdjustments, RatingFilter, RatingSort, RatingSortField, SortDirection
    },
    DatabaseError, PerformanceSource, RatingStore
};
use crate::model::structures::{
    race_category::RaceCategory, rating_scale::RatingScale, rating_status::RatingStatus,
    terrain_condition::TerrainCondition
};
use async_trait::async_trait;
use postgres_types::{Json, ToSql};
use std::{collections::BTreeMap, sync::Arc};
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};

const RATING_COLUMNS: &str = "id, horse_id, local_rating, confidence, races_analyzed, adjustments, \
    international_conversions, status, is_current, created_at";

/// Postgres-backed performance source and rating store.
///
/// Supersession runs inside a transaction holding a per-horse advisory lock,
/// so concurrent writers (including other processes) serialize per horse.
#[derive(Clone)]
pub struct DbClient {
    client: Arc<Mutex<Client>>
}

impl DbClient {
    // Connect to the database and return a DbClient instance
    pub async fn connect(connection_str: &str) -> Result<Self, DatabaseError> {
        let (client, connection) = tokio_postgres::connect(connection_str, NoTls).await?;

        // Spawn the connection object to run in the background
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("connection error: {}", e);
            }
        });

        info!("Connected to database");
        Ok(DbClient {
            client: Arc::new(Mutex::new(client))
        })
    }

    /// Ids of every horse holding a current rating, ascending.
    pub async fn get_rated_horse_ids(&self) -> Result<Vec<i32>, DatabaseError> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT horse_id FROM horse_ratings WHERE is_current ORDER BY horse_id",
                &[]
            )
            .await?;

        Ok(rows.iter().map(|row| row.get("horse_id")).collect())
    }

    fn performance_from_row(row: &Row) -> Result<PerformanceRecord, DatabaseError> {
        let race_category = RaceCategory::try_from(row.get::<_, i32>("race_category")).map_err(|_| {
            DatabaseError::Corrupt {
                column: "race_category",
                reason: format!("unknown value {}", row.get::<_, i32>("race_category"))
            }
        })?;
        let terrain_condition = TerrainCondition::try_from(row.get::<_, i32>("terrain_condition")).map_err(|_| {
            DatabaseError::Corrupt {
                column: "terrain_condition",
                reason: format!("unknown value {}", row.get::<_, i32>("terrain_condition"))
            }
        })?;
        let Json(opponents): Json<Vec<Opponent>> = row.get("opponents");

        Ok(PerformanceRecord {
            position: row.get("position"),
            lengths_behind: row.get("lengths_behind"),
            weight_carried_kg: row.get("weight_carried_kg"),
            distance_meters: row.get("distance_meters"),
            race_category,
            terrain_condition,
            race_date: row.get("race_date"),
            opponents
        })
    }

    fn rating_from_row(row: &Row) -> Result<Rating, DatabaseError> {
        let status = RatingStatus::try_from(row.get::<_, i32>("status")).map_err(|_| DatabaseError::Corrupt {
            column: "status",
            reason: format!("unknown value {}", row.get::<_, i32>("status"))
        })?;
        let Json(adjustments): Json<RatingAdjustments> = row.get("adjustments");
        let Json(international_conversions): Json<BTreeMap<RatingScale, f64>> = row.get("international_conversions");

        Ok(Rating {
            id: row.get("id"),
            horse_id: row.get("horse_id"),
            local_rating: row.get("local_rating"),
            confidence: row.get("confidence"),
            races_analyzed: row.get("races_analyzed"),
            adjustments,
            international_conversions,
            status,
            is_current: row.get("is_current"),
            created_at: row.get("created_at")
        })
    }
}

#[async_trait]
impl PerformanceSource for DbClient {
    async fn fetch_recent_performances(
        &self,
        horse_id: i32,
        limit: usize
    ) -> Result<Vec<PerformanceRecord>, DatabaseError> {
        let limit = limit as i64;
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT position, lengths_behind, weight_carried_kg, distance_meters, race_category, \
                 terrain_condition, race_date, opponents \
                 FROM horse_performances WHERE horse_id = $1 \
                 ORDER BY race_date DESC, id DESC LIMIT $2",
                &[&horse_id, &limit]
            )
            .await?;

        debug!(horse_id, count = rows.len(), "Fetched performances");
        rows.iter().map(Self::performance_from_row).collect()
    }
}

#[async_trait]
impl RatingStore for DbClient {
    async fn get_current_rating(&self, horse_id: i32) -> Result<Option<Rating>, DatabaseError> {
        let query = format!("SELECT {RATING_COLUMNS} FROM horse_ratings WHERE horse_id = $1 AND is_current");
        let client = self.client.lock().await;
        let row = client.query_opt(query.as_str(), &[&horse_id]).await?;

        row.as_ref().map(Self::rating_from_row).transpose()
    }

    async fn upsert_current_rating(&self, horse_id: i32, rating: Rating) -> Result<Rating, DatabaseError> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;

        transaction
            .execute("SELECT pg_advisory_xact_lock($1::bigint)", &[&(horse_id as i64)])
            .await?;

        let superseded = transaction
            .execute(
                "UPDATE horse_ratings SET is_current = false, status = $2 WHERE horse_id = $1 AND is_current",
                &[&horse_id, &(RatingStatus::Superseded as i32)]
            )
            .await?;

        let row = transaction
            .query_one(
                "INSERT INTO horse_ratings (horse_id, local_rating, confidence, races_analyzed, adjustments, \
                 international_conversions, status, is_current, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, true, $8) RETURNING id",
                &[
                    &horse_id,
                    &rating.local_rating,
                    &rating.confidence,
                    &rating.races_analyzed,
                    &Json(&rating.adjustments),
                    &Json(&rating.international_conversions),
                    &(rating.status as i32),
                    &rating.created_at
                ]
            )
            .await?;

        transaction.commit().await?;

        let stored = Rating {
            id: row.get("id"),
            horse_id,
            is_current: true,
            ..rating
        };

        debug!(horse_id, rating_id = stored.id, superseded, "Stored current rating");
        Ok(stored)
    }

    async fn list_ratings(
        &self,
        filter: &RatingFilter,
        sort: RatingSort,
        page: Page
    ) -> Result<Vec<Rating>, DatabaseError> {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn ToSql + Sync + Send>> = Vec::new();

        if let Some(horse_id) = filter.horse_id {
            params.push(Box::new(horse_id));
            conditions.push(format!("horse_id = ${}", params.len()));
        }
        if filter.current_only {
            conditions.push("is_current".to_string());
        }
        if let Some(min) = filter.min_rating {
            params.push(Box::new(min));
            conditions.push(format!("local_rating >= ${}", params.len()));
        }
        if let Some(max) = filter.max_rating {
            params.push(Box::new(max));
            conditions.push(format!("local_rating <= ${}", params.len()));
        }
        if let Some(after_id) = filter.after_id {
            params.push(Box::new(after_id));
            conditions.push(format!("id > ${}", params.len()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let column = match sort.field {
            RatingSortField::LocalRating => "local_rating",
            RatingSortField::Confidence => "confidence",
            RatingSortField::CreatedAt => "created_at",
            RatingSortField::Id => "id"
        };
        let direction = match sort.direction {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC"
        };

        params.push(Box::new(page.size as i64));
        let limit_index = params.len();
        params.push(Box::new(page.offset() as i64));
        let offset_index = params.len();

        let query = format!(
            "SELECT {RATING_COLUMNS} FROM horse_ratings {where_clause} \
             ORDER BY {column} {direction}, id {direction} LIMIT ${limit_index} OFFSET ${offset_index}"
        );

        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p.as_ref() as &(dyn ToSql + Sync)).collect();
        let client = self.client.lock().await;
        let rows = client.query(query.as_str(), &refs).await?;

        rows.iter().map(Self::rating_from_row).collect()
    }
}
