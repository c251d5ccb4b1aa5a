use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::database::DatabaseError;

#[derive(Debug, Error)]
pub enum RatingError {
    #[error("No performance data available for horse {horse_id}")]
    NoPerformanceData { horse_id: i32 },

    #[error("Invalid performance at index {index}: {reason}")]
    InvalidPerformanceInput { index: usize, reason: String },

    #[error("Unknown rating scale '{0}'")]
    UnknownScale(String),

    #[error("Rating value {0} is not a finite number")]
    InvalidRatingValue(f64),

    #[error("Failed to persist rating: {0}")]
    Persistence(#[source] DatabaseError),

    #[error("Failed to read performances: {0}")]
    PerformanceSource(#[source] DatabaseError),

    #[error("{operation} did not complete within {timeout:?}")]
    ComputationTimeout {
        operation: &'static str,
        timeout: Duration
    }
}

impl RatingError {
    /// Stable identifier handed to API consumers.
    pub fn code(&self) -> &'static str {
        match self {
            RatingError::NoPerformanceData { .. } => "NO_PERFORMANCE_DATA",
            RatingError::InvalidPerformanceInput { .. } => "INVALID_PERFORMANCE_INPUT",
            RatingError::UnknownScale(_) => "UNKNOWN_SCALE",
            RatingError::InvalidRatingValue(_) => "INVALID_RATING_VALUE",
            RatingError::Persistence(_) => "RATING_PERSISTENCE_ERROR",
            RatingError::PerformanceSource(_) => "PERFORMANCE_SOURCE_ERROR",
            RatingError::ComputationTimeout { .. } => "COMPUTATION_TIMEOUT"
        }
    }

    /// Errors caused by the caller's input rather than by the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RatingError::InvalidPerformanceInput { .. }
                | RatingError::UnknownScale(_)
                | RatingError::InvalidRatingValue(_)
        )
    }

    /// Conditions worth retrying or reporting as "insufficient data" instead of a fault.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RatingError::NoPerformanceData { .. }
                | RatingError::Persistence(_)
                | RatingError::PerformanceSource(_)
                | RatingError::ComputationTimeout { .. }
        )
    }

    pub fn payload(&self) -> ErrorPayload {
        ErrorPayload {
            code: self.code(),
            message: self.to_string()
        }
    }
}

/// Typed error body returned by rating and conversion endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String
}
