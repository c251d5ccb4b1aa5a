use crate::model::structures::{
    race_category::RaceCategory, rating_scale::RatingScale, rating_status::RatingStatus,
    terrain_condition::TerrainCondition
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Another runner from the same race, used as an external reference point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opponent {
    pub name: String,
    pub position: i32,
    pub is_international: bool,
    /// Rating on the local scale, when one is known
    pub known_rating: Option<f64>
}

/// One past run of a horse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceRecord {
    pub position: i32,
    pub lengths_behind: f64,
    pub weight_carried_kg: f64,
    pub distance_meters: i32,
    pub race_category: RaceCategory,
    pub terrain_condition: TerrainCondition,
    pub race_date: NaiveDate,
    #[serde(default)]
    pub opponents: Vec<Opponent>
}

/// Per-factor contributions that led to a rating, each expressed in rating points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingAdjustments {
    pub weight: f64,
    pub terrain: f64,
    pub class: f64,
    pub international: f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    /// Unknown until insertion
    pub id: i32,
    pub horse_id: i32,
    pub local_rating: f64,
    /// 0 to 100
    pub confidence: f64,
    pub races_analyzed: i32,
    pub adjustments: RatingAdjustments,
    pub international_conversions: BTreeMap<RatingScale, f64>,
    pub status: RatingStatus,
    pub is_current: bool,
    pub created_at: DateTime<Utc>
}

impl Rating {
    pub fn is_provisional(&self) -> bool {
        self.status == RatingStatus::Provisional
    }

    /// Marks this rating as historical. Returns false if the rating was already superseded.
    pub fn supersede(&mut self) -> bool {
        if !self.status.can_transition_to(RatingStatus::Superseded) {
            return false;
        }

        self.status = RatingStatus::Superseded;
        self.is_current = false;
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingFilter {
    pub horse_id: Option<i32>,
    pub current_only: bool,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    /// Only rows with a greater id; the cursor for keyset scans
    pub after_id: Option<i32>
}

impl RatingFilter {
    pub fn current() -> Self {
        RatingFilter {
            current_only: true,
            ..Default::default()
        }
    }

    pub fn for_horse(horse_id: i32) -> Self {
        RatingFilter {
            horse_id: Some(horse_id),
            ..Default::default()
        }
    }

    pub fn matches(&self, rating: &Rating) -> bool {
        self.horse_id.map_or(true, |id| rating.horse_id == id)
            && (!self.current_only || rating.is_current)
            && self.min_rating.map_or(true, |min| rating.local_rating >= min)
            && self.max_rating.map_or(true, |max| rating.local_rating <= max)
            && self.after_id.map_or(true, |after| rating.id > after)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RatingSortField {
    LocalRating,
    Confidence,
    #[default]
    CreatedAt,
    Id
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingSort {
    pub field: RatingSortField,
    pub direction: SortDirection
}

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub number: u32,
    pub size: u32
}

impl Page {
    pub fn new(number: u32, size: u32) -> Self {
        Page { number, size }
    }

    pub fn offset(&self) -> u64 {
        self.number as u64 * self.size as u64
    }
}

impl Default for Page {
    fn default() -> Self {
        Page { number: 0, size: 50 }
    }
}
