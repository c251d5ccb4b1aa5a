use crate::{
    database::db_structs::{PerformanceRecord, Rating, RatingAdjustments},
    model::structures::{
        race_category::RaceCategory, rating_status::RatingStatus, terrain_condition::TerrainCondition
    }
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use strum::IntoEnumIterator;

/// A clean run: no lengths behind, 56kg over 1600m on good ground, no opponents recorded.
pub fn generate_performance(position: i32, race_category: RaceCategory, race_date: &str) -> PerformanceRecord {
    PerformanceRecord {
        position,
        lengths_behind: 0.0,
        weight_carried_kg: 56.0,
        distance_meters: 1600,
        race_category,
        terrain_condition: TerrainCondition::Good,
        race_date: NaiveDate::parse_from_str(race_date, "%Y-%m-%d").unwrap(),
        opponents: Vec::new()
    }
}

/// Generates `n` valid performances, most recent first, spaced two to five weeks apart.
pub fn generate_performances(n: usize, seed: u64) -> Vec<PerformanceRecord> {
    // Initialize seeded RNG for reproducible results
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let categories: Vec<RaceCategory> = RaceCategory::iter().collect();
    let terrains: Vec<TerrainCondition> = TerrainCondition::iter().collect();
    let distances = [1000, 1200, 1400, 1600, 2000, 2400, 3200];

    let mut race_date = NaiveDate::from_ymd_opt(2026, 9, 27).unwrap();
    let mut performances = Vec::with_capacity(n);

    for _ in 0..n {
        let position = rng.random_range(1..=14);
        let lengths_behind = if position == 1 {
            0.0
        } else {
            (rng.random_range(0.0..12.0_f64) * 4.0).round() / 4.0
        };

        performances.push(PerformanceRecord {
            position,
            lengths_behind,
            weight_carried_kg: rng.random_range(50..=62) as f64,
            distance_meters: distances[rng.random_range(0..distances.len())],
            race_category: categories[rng.random_range(0..categories.len())],
            terrain_condition: terrains[rng.random_range(0..terrains.len())],
            race_date,
            opponents: Vec::new()
        });

        race_date -= Duration::days(rng.random_range(14..=35));
    }

    performances
}

pub fn generate_rating(horse_id: i32, local_rating: f64, confidence: f64) -> Rating {
    Rating {
        id: 0,
        horse_id,
        local_rating,
        confidence,
        races_analyzed: 5,
        adjustments: RatingAdjustments::default(),
        international_conversions: BTreeMap::new(),
        status: RatingStatus::Calculated,
        is_current: true,
        created_at: Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }
}
