use crate::{database::db_structs::Rating, model::structures::rating_status::RatingStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublisherError {
    #[cfg(feature = "messaging")]
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Broker did not acknowledge message {message_id}")]
    NotAcknowledged { message_id: String },

    #[error("Publisher is not connected")]
    NotConnected
}

/// Published after a rating has been stored as a horse's current rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RatingCalculatedMessage {
    pub horse_id: i32,
    pub rating_id: i32,
    pub local_rating: f64,
    pub confidence: f64,
    pub status: RatingStatus,
    pub calculated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>
}

impl RatingCalculatedMessage {
    pub fn from_rating(rating: &Rating, correlation_id: Option<String>) -> Self {
        RatingCalculatedMessage {
            horse_id: rating.horse_id,
            rating_id: rating.id,
            local_rating: rating.local_rating,
            confidence: rating.confidence,
            status: rating.status,
            calculated_at: rating.created_at,
            correlation_id
        }
    }
}

/// Announces freshly stored ratings to downstream consumers.
#[async_trait]
pub trait RatingEventPublisher: Send + Sync {
    async fn publish_rating_calculated(&self, message: &RatingCalculatedMessage) -> Result<(), PublisherError>;
}
