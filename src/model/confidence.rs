use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::model::constants;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceParameters {
    pub base: f64,
    pub per_race: f64,
    pub races_cap: f64,
    pub consistency_max: f64,
    pub variance_scale: f64,
    pub international_bonus: f64,
    pub recency_bonus: f64,
    pub recent_race_days: i64,
    pub extreme_penalty: f64,
    pub plausible_min: f64,
    pub plausible_max: f64
}

impl Default for ConfidenceParameters {
    fn default() -> Self {
        ConfidenceParameters {
            base: constants::CONFIDENCE_BASE,
            per_race: constants::CONFIDENCE_PER_RACE,
            races_cap: constants::CONFIDENCE_RACES_CAP,
            consistency_max: constants::CONFIDENCE_CONSISTENCY_MAX,
            variance_scale: constants::CONFIDENCE_VARIANCE_SCALE,
            international_bonus: constants::CONFIDENCE_INTERNATIONAL_BONUS,
            recency_bonus: constants::CONFIDENCE_RECENCY_BONUS,
            recent_race_days: constants::RECENT_RACE_DAYS,
            extreme_penalty: constants::CONFIDENCE_EXTREME_PENALTY,
            plausible_min: constants::PLAUSIBLE_RATING_MIN,
            plausible_max: constants::PLAUSIBLE_RATING_MAX
        }
    }
}

/// Everything the confidence estimate depends on.
#[derive(Debug, Clone)]
pub struct ConfidenceInputs<'a> {
    pub races_analyzed: usize,
    /// Clamped per-performance scores
    pub scores: &'a [f64],
    pub international_reference_used: bool,
    pub most_recent_race: NaiveDate,
    pub as_of: DateTime<Utc>,
    pub final_rating: f64
}

/// Returns a 0-100 score describing how trustworthy a rating is.
///
/// Sample size, score consistency and recency raise the estimate. Ratings
/// outside the plausible band are penalized since the model is least reliable there.
pub fn estimate(inputs: &ConfidenceInputs, params: &ConfidenceParameters) -> f64 {
    let mut confidence = params.base;

    confidence += races_bonus(inputs.races_analyzed, params);
    confidence += consistency_bonus(inputs.scores, params);

    if inputs.international_reference_used {
        confidence += params.international_bonus;
    }

    if is_recent(inputs.most_recent_race, inputs.as_of, params.recent_race_days) {
        confidence += params.recency_bonus;
    }

    if inputs.final_rating > params.plausible_max || inputs.final_rating < params.plausible_min {
        confidence -= params.extreme_penalty;
    }

    constants::round_one_decimal(confidence.clamp(0.0, 100.0))
}

/// Diminishing returns: capped once enough races have been seen.
fn races_bonus(races_analyzed: usize, params: &ConfidenceParameters) -> f64 {
    (races_analyzed as f64 * params.per_race).min(params.races_cap)
}

fn consistency_bonus(scores: &[f64], params: &ConfidenceParameters) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }

    let variance = scores.iter().population_variance();
    if !variance.is_finite() {
        return 0.0;
    }

    params.consistency_max / (1.0 + variance / params.variance_scale)
}

fn is_recent(race_date: NaiveDate, as_of: DateTime<Utc>, days: i64) -> bool {
    let elapsed = as_of.date_naive().signed_duration_since(race_date);

    elapsed.num_days() <= days
}
