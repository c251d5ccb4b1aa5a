use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    database::db_structs::{Opponent, PerformanceRecord, Rating, RatingAdjustments},
    error::RatingError,
    model::{
        confidence::{self, ConfidenceInputs, ConfidenceParameters},
        constants,
        constants::round_one_decimal,
        international::{self, InternationalParameters},
        structures::{
            performance_order::PerformanceOrder, race_category::RaceCategory, rating_status::RatingStatus,
            terrain_condition::TerrainCondition
        }
    }
};

/// Every coefficient the rating algorithm uses. Defaults come from
/// [`constants`]; callers may tune any of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringParameters {
    pub base_score: f64,
    pub position_bonuses: [f64; 4],
    pub position_penalty_per_place: f64,
    pub reference_weight_kg: f64,
    pub weight_bonus_per_kg: f64,
    pub weight_penalty_per_kg: f64,
    pub class_bonuses: [f64; 7],
    pub terrain_adjustments: [f64; 5],
    pub lengths_penalty_bands: Vec<(i32, f64)>,
    pub rating_floor: f64,
    pub rating_ceiling: f64,
    pub max_performances: usize,
    pub recency_decay_per_race: f64,
    pub recency_weight_floor: f64,
    pub provisional_race_threshold: usize,
    pub provisional_penalty_factor: f64,
    pub provisional_confidence_cap: f64,
    pub international: InternationalParameters,
    pub confidence: ConfidenceParameters
}

impl Default for ScoringParameters {
    fn default() -> Self {
        ScoringParameters {
            base_score: constants::BASE_SCORE,
            position_bonuses: constants::POSITION_BONUSES,
            position_penalty_per_place: constants::POSITION_PENALTY_PER_PLACE,
            reference_weight_kg: constants::REFERENCE_WEIGHT_KG,
            weight_bonus_per_kg: constants::WEIGHT_BONUS_PER_KG,
            weight_penalty_per_kg: constants::WEIGHT_PENALTY_PER_KG,
            class_bonuses: constants::CLASS_BONUSES,
            terrain_adjustments: constants::TERRAIN_ADJUSTMENTS,
            lengths_penalty_bands: constants::LENGTHS_PENALTY_BANDS.to_vec(),
            rating_floor: constants::RATING_FLOOR,
            rating_ceiling: constants::RATING_CEILING,
            max_performances: constants::MAX_PERFORMANCES,
            recency_decay_per_race: constants::RECENCY_DECAY_PER_RACE,
            recency_weight_floor: constants::RECENCY_WEIGHT_FLOOR,
            provisional_race_threshold: constants::PROVISIONAL_RACE_THRESHOLD,
            provisional_penalty_factor: constants::PROVISIONAL_PENALTY_FACTOR,
            provisional_confidence_cap: constants::PROVISIONAL_CONFIDENCE_CAP,
            international: InternationalParameters::default(),
            confidence: ConfidenceParameters::default()
        }
    }
}

/// Breakdown of a single performance's score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceScore {
    pub position: f64,
    pub lengths: f64,
    pub weight: f64,
    pub class: f64,
    pub terrain: f64,
    /// Sum of the base score and every component, before clamping
    pub raw: f64,
    pub score: f64
}

#[derive(Debug, Clone, Default)]
pub struct RatingCalculator {
    params: ScoringParameters
}

impl RatingCalculator {
    pub fn new(params: ScoringParameters) -> Self {
        RatingCalculator { params }
    }

    pub fn params(&self) -> &ScoringParameters {
        &self.params
    }

    pub fn calculate(
        &self,
        horse_id: i32,
        performances: &[PerformanceRecord],
        order: PerformanceOrder
    ) -> Result<Rating, RatingError> {
        self.calculate_as_of(horse_id, performances, order, Utc::now())
    }

    /// # Rating calculation
    ///
    /// Steps:
    /// 1. Validate every performance.
    /// 2. Score the most recent `max_performances` runs individually, clamping
    ///     each score to the rating bounds.
    /// 3. Aggregate with a recency-weighted mean (most recent run weighted highest).
    /// 4. Nudge toward internationally rated opponents, capped.
    /// 5. Apply the provisional penalty when too few runs are available.
    /// 6. Estimate confidence as of `as_of`.
    ///
    /// The international conversions are left empty; they are filled by the
    /// scale converter.
    pub fn calculate_as_of(
        &self,
        horse_id: i32,
        performances: &[PerformanceRecord],
        order: PerformanceOrder,
        as_of: DateTime<Utc>
    ) -> Result<Rating, RatingError> {
        if performances.is_empty() {
            return Err(RatingError::NoPerformanceData { horse_id });
        }

        validate(performances)?;

        let mut ordered: Vec<&PerformanceRecord> = performances.iter().collect();
        if order == PerformanceOrder::OldestFirst {
            ordered.reverse();
        }
        ordered.truncate(self.params.max_performances);

        let scores: Vec<PerformanceScore> = ordered.iter().map(|p| self.score_performance(p)).collect();
        let weights = self.recency_weights(ordered.len());

        let base = weighted_mean(scores.iter().map(|s| s.score), &weights);
        let international = international::adjustment(&ordered, &weights, base, &self.params.international);

        let races_analyzed = ordered.len();
        let provisional = races_analyzed < self.params.provisional_race_threshold;

        let mut rating = self.clamp(base + international.total);
        if provisional {
            rating = self.clamp(rating * self.params.provisional_penalty_factor);
        }
        let local_rating = round_one_decimal(rating);

        let clamped_scores: Vec<f64> = scores.iter().map(|s| s.score).collect();
        let mut confidence = confidence::estimate(
            &ConfidenceInputs {
                races_analyzed,
                scores: &clamped_scores,
                international_reference_used: international.reference_used(),
                most_recent_race: ordered[0].race_date,
                as_of,
                final_rating: local_rating
            },
            &self.params.confidence
        );
        if provisional {
            confidence = confidence.min(self.params.provisional_confidence_cap);
        }

        let adjustments = RatingAdjustments {
            weight: round_one_decimal(weighted_mean(scores.iter().map(|s| s.weight), &weights)),
            terrain: round_one_decimal(weighted_mean(scores.iter().map(|s| s.terrain), &weights)),
            class: round_one_decimal(weighted_mean(scores.iter().map(|s| s.class), &weights)),
            international: round_one_decimal(international.total)
        };

        debug!(
            horse_id,
            base,
            local_rating,
            confidence,
            races_analyzed,
            provisional,
            "Calculated rating"
        );

        Ok(Rating {
            id: 0,
            horse_id,
            local_rating,
            confidence,
            races_analyzed: races_analyzed as i32,
            adjustments,
            international_conversions: BTreeMap::new(),
            status: if provisional {
                RatingStatus::Provisional
            } else {
                RatingStatus::Calculated
            },
            is_current: true,
            created_at: as_of
        })
    }

    /// Scores one run, starting from the base score.
    pub fn score_performance(&self, performance: &PerformanceRecord) -> PerformanceScore {
        let position = self.position_adjustment(performance.position);
        let lengths = -performance.lengths_behind * self.penalty_per_length(performance.distance_meters);
        let weight = self.weight_adjustment(performance.weight_carried_kg);
        let class = self.class_bonus(performance.race_category);
        let terrain = self.terrain_adjustment(performance.terrain_condition);

        let raw = self.params.base_score + position + lengths + weight + class + terrain;

        PerformanceScore {
            position,
            lengths,
            weight,
            class,
            terrain,
            raw,
            score: self.clamp(raw)
        }
    }

    fn position_adjustment(&self, position: i32) -> f64 {
        match position {
            1..=4 => self.params.position_bonuses[(position - 1) as usize],
            _ => -((position - 4) as f64) * self.params.position_penalty_per_place
        }
    }

    /// Shorter races cost more per length: the same gap is a larger share of the race.
    pub fn penalty_per_length(&self, distance_meters: i32) -> f64 {
        self.params
            .lengths_penalty_bands
            .iter()
            .find(|(max_distance, _)| distance_meters <= *max_distance)
            .or(self.params.lengths_penalty_bands.last())
            .map_or(0.0, |(_, penalty)| *penalty)
    }

    fn weight_adjustment(&self, weight_carried_kg: f64) -> f64 {
        let delta = weight_carried_kg - self.params.reference_weight_kg;

        if delta >= 0.0 {
            delta * self.params.weight_bonus_per_kg
        } else {
            delta * self.params.weight_penalty_per_kg
        }
    }

    fn class_bonus(&self, category: RaceCategory) -> f64 {
        self.params.class_bonuses[category.tier()]
    }

    fn terrain_adjustment(&self, terrain: TerrainCondition) -> f64 {
        self.params.terrain_adjustments[terrain as usize]
    }

    /// Linear decay by recency rank, bounded below by the weight floor.
    fn recency_weights(&self, n: usize) -> Vec<f64> {
        (0..n)
            .map(|rank| {
                (1.0 - rank as f64 * self.params.recency_decay_per_race).max(self.params.recency_weight_floor)
            })
            .collect()
    }

    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.params.rating_floor, self.params.rating_ceiling)
    }
}

fn validate(performances: &[PerformanceRecord]) -> Result<(), RatingError> {
    for (index, p) in performances.iter().enumerate() {
        let reason = if p.position < 1 {
            Some(format!("position must be at least 1, found {}", p.position))
        } else if !p.weight_carried_kg.is_finite() || p.weight_carried_kg < 0.0 {
            Some(format!("weight carried must be non-negative, found {}", p.weight_carried_kg))
        } else if p.distance_meters <= 0 {
            Some(format!("distance must be positive, found {}", p.distance_meters))
        } else if !p.lengths_behind.is_finite() || p.lengths_behind < 0.0 {
            Some(format!("lengths behind must be non-negative, found {}", p.lengths_behind))
        } else {
            p.opponents.iter().find_map(invalid_opponent)
        };

        if let Some(reason) = reason {
            return Err(RatingError::InvalidPerformanceInput { index, reason });
        }
    }

    Ok(())
}

fn invalid_opponent(opponent: &Opponent) -> Option<String> {
    if opponent.position < 1 {
        return Some(format!(
            "opponent {} position must be at least 1, found {}",
            opponent.name, opponent.position
        ));
    }

    match opponent.known_rating {
        Some(rating) if !rating.is_finite() => Some(format!(
            "opponent {} known rating must be finite, found {rating}",
            opponent.name
        )),
        _ => None
    }
}

fn weighted_mean(values: impl Iterator<Item = f64>, weights: &[f64]) -> f64 {
    let (sum, total_weight) = values
        .zip(weights)
        .fold((0.0, 0.0), |(sum, total), (value, weight)| (sum + value * weight, total + weight));

    if total_weight == 0.0 {
        return 0.0;
    }

    sum / total_weight
}
