use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{database::db_structs::PerformanceRecord, model::constants};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternationalParameters {
    /// Rating points implied by one finishing place between two runners
    pub points_per_place: f64,
    /// Discrepancies up to this many points are treated as noise
    pub discrepancy_threshold: f64,
    /// Share of a discrepancy applied as a nudge
    pub nudge_rate: f64,
    /// Cap on the cumulative nudge, as a fraction of the base rating
    pub max_adjustment_ratio: f64
}

impl Default for InternationalParameters {
    fn default() -> Self {
        InternationalParameters {
            points_per_place: constants::POINTS_PER_PLACE,
            discrepancy_threshold: constants::INTERNATIONAL_DISCREPANCY_THRESHOLD,
            nudge_rate: constants::INTERNATIONAL_NUDGE_RATE,
            max_adjustment_ratio: constants::INTERNATIONAL_MAX_ADJUSTMENT_RATIO
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InternationalAdjustment {
    /// Points to add to the base rating, already capped
    pub total: f64,
    pub references_used: usize
}

impl InternationalAdjustment {
    pub fn reference_used(&self) -> bool {
        self.references_used > 0
    }
}

/// Compares the horse against internationally rated opponents it met.
///
/// Each opponent implies a rating for the horse: its known rating shifted by
/// `points_per_place` for every place separating the two finishers. When that
/// implied rating disagrees with `base_rating` by more than the threshold, a
/// recency-weighted nudge toward it is accumulated. The cumulative nudge never
/// exceeds `max_adjustment_ratio` of the base rating in either direction.
///
/// `performances` and `weights` are parallel slices, most recent first.
pub fn adjustment(
    performances: &[&PerformanceRecord],
    weights: &[f64],
    base_rating: f64,
    params: &InternationalParameters
) -> InternationalAdjustment {
    let mut nudge = 0.0;
    let mut references_used = 0;

    for (performance, weight) in performances.iter().zip(weights) {
        let references = performance
            .opponents
            .iter()
            .filter(|o| o.is_international)
            .filter_map(|o| o.known_rating.map(|rating| (o, rating)));

        for (opponent, known_rating) in references {
            references_used += 1;

            let places_ahead = (i64::from(opponent.position) - i64::from(performance.position)) as f64;
            let implied = known_rating + places_ahead * params.points_per_place;
            let discrepancy = implied - base_rating;

            if discrepancy.abs() > params.discrepancy_threshold {
                debug!(
                    opponent = %opponent.name,
                    implied,
                    base_rating,
                    "International reference disagrees with base rating"
                );
                nudge += discrepancy * params.nudge_rate * weight;
            }
        }
    }

    let cap = (base_rating * params.max_adjustment_ratio).abs();

    InternationalAdjustment {
        total: nudge.clamp(-cap, cap),
        references_used
    }
}
