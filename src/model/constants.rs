// Per-performance scoring
pub const BASE_SCORE: f64 = 35.0;
/// Bonus for finishing 1st, 2nd, 3rd and 4th
pub const POSITION_BONUSES: [f64; 4] = [15.0, 8.0, 5.0, 2.0];
pub const POSITION_PENALTY_PER_PLACE: f64 = 2.5;
pub const REFERENCE_WEIGHT_KG: f64 = 56.0;
pub const WEIGHT_BONUS_PER_KG: f64 = 0.5;
pub const WEIGHT_PENALTY_PER_KG: f64 = 0.3;
/// Indexed by `RaceCategory::tier()`
pub const CLASS_BONUSES: [f64; 7] = [35.0, 28.0, 22.0, 16.0, 10.0, 5.0, 0.0];
/// Indexed by `TerrainCondition as usize`
pub const TERRAIN_ADJUSTMENTS: [f64; 5] = [1.5, 0.0, 0.0, -2.0, -3.0];
/// (upper distance bound in meters, penalty per length behind)
pub const LENGTHS_PENALTY_BANDS: [(i32, f64); 5] =
    [(1200, 2.0), (1600, 1.6), (2000, 1.3), (2400, 1.1), (i32::MAX, 0.9)];
// Bounds shared by per-performance scores and final ratings
pub const RATING_FLOOR: f64 = 20.0;
pub const RATING_CEILING: f64 = 140.0;

// Aggregation
pub const MAX_PERFORMANCES: usize = 10;
pub const RECENCY_DECAY_PER_RACE: f64 = 0.1;
pub const RECENCY_WEIGHT_FLOOR: f64 = 0.3;
pub const PROVISIONAL_RACE_THRESHOLD: usize = 3;
pub const PROVISIONAL_PENALTY_FACTOR: f64 = 0.85;
pub const PROVISIONAL_CONFIDENCE_CAP: f64 = 29.0;

// International references
pub const POINTS_PER_PLACE: f64 = 2.0;
pub const INTERNATIONAL_DISCREPANCY_THRESHOLD: f64 = 2.0;
pub const INTERNATIONAL_NUDGE_RATE: f64 = 0.25;
pub const INTERNATIONAL_MAX_ADJUSTMENT_RATIO: f64 = 0.15;

// Confidence
pub const CONFIDENCE_BASE: f64 = 45.0;
pub const CONFIDENCE_PER_RACE: f64 = 7.0;
pub const CONFIDENCE_RACES_CAP: f64 = 30.0;
pub const CONFIDENCE_CONSISTENCY_MAX: f64 = 15.0;
pub const CONFIDENCE_VARIANCE_SCALE: f64 = 25.0;
pub const CONFIDENCE_INTERNATIONAL_BONUS: f64 = 5.0;
pub const CONFIDENCE_RECENCY_BONUS: f64 = 10.0;
pub const RECENT_RACE_DAYS: i64 = 90;
pub const CONFIDENCE_EXTREME_PENALTY: f64 = 15.0;
pub const PLAUSIBLE_RATING_MIN: f64 = 30.0;
pub const PLAUSIBLE_RATING_MAX: f64 = 100.0;

// Scale conversion
pub const BAND_TOLERANCE: f64 = 2.5;
pub const FRANCE_COEFFICIENT: f64 = 0.9;
pub const UK_FROM_FRANCE_COEFFICIENT: f64 = 2.2;
pub const UAE_COEFFICIENT: f64 = 0.9;
pub const IFHA_COEFFICIENT: f64 = 0.85;
pub const FRANCE_CONFIDENCE: f64 = 85.0;
pub const UK_CONFIDENCE: f64 = 70.0;
pub const UAE_CONFIDENCE: f64 = 85.0;
pub const IFHA_CONFIDENCE: f64 = 80.0;
pub const IMPLAUSIBLE_CONFIDENCE_PENALTY: f64 = 12.0;

/// Rounds to one decimal place, the precision ratings are published with.
pub fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
