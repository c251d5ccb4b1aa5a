use std::{collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use tracing::debug;

use crate::{
    database::{
        db_structs::{Page, Rating, RatingFilter, RatingSort, RatingSortField, SortDirection},
        DatabaseError, RatingStore
    },
    model::constants::round_one_decimal
};

const SCAN_PAGE_SIZE: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter, Display)]
pub enum RatingBand {
    #[serde(rename = "90+")]
    #[strum(serialize = "90+")]
    NinetyPlus,
    #[serde(rename = "80-89")]
    #[strum(serialize = "80-89")]
    Eighties,
    #[serde(rename = "70-79")]
    #[strum(serialize = "70-79")]
    Seventies,
    #[serde(rename = "60-69")]
    #[strum(serialize = "60-69")]
    Sixties,
    #[serde(rename = "50-59")]
    #[strum(serialize = "50-59")]
    Fifties,
    #[serde(rename = "<50")]
    #[strum(serialize = "<50")]
    BelowFifty
}

impl RatingBand {
    pub fn of(local_rating: f64) -> RatingBand {
        match local_rating {
            r if r >= 90.0 => RatingBand::NinetyPlus,
            r if r >= 80.0 => RatingBand::Eighties,
            r if r >= 70.0 => RatingBand::Seventies,
            r if r >= 60.0 => RatingBand::Sixties,
            r if r >= 50.0 => RatingBand::Fifties,
            _ => RatingBand::BelowFifty
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// 0 when nothing is rated
    pub average_rating: f64,
    pub total_rated: u64,
    /// Every band is present, highest first
    pub distribution: IndexMap<RatingBand, u64>,
    pub highest: Option<f64>,
    pub lowest: Option<f64>
}

impl Statistics {
    pub fn from_ratings<'a>(ratings: impl IntoIterator<Item = &'a Rating>) -> Statistics {
        let mut distribution: IndexMap<RatingBand, u64> = RatingBand::iter().map(|band| (band, 0)).collect();
        let mut total_rated = 0u64;
        let mut sum = 0.0;
        let mut highest: Option<f64> = None;
        let mut lowest: Option<f64> = None;

        for rating in ratings.into_iter().filter(|r| r.is_current) {
            total_rated += 1;
            sum += rating.local_rating;
            *distribution.entry(RatingBand::of(rating.local_rating)).or_default() += 1;
            highest = Some(highest.map_or(rating.local_rating, |h| h.max(rating.local_rating)));
            lowest = Some(lowest.map_or(rating.local_rating, |l| l.min(rating.local_rating)));
        }

        let average_rating = if total_rated == 0 {
            0.0
        } else {
            round_one_decimal(sum / total_rated as f64)
        };

        Statistics {
            average_rating,
            total_rated,
            distribution,
            highest,
            lowest
        }
    }
}

/// Summarizes every current rating in the store.
pub struct StatisticsAggregator {
    store: Arc<dyn RatingStore>,
    page_size: u32
}

impl StatisticsAggregator {
    pub fn new(store: Arc<dyn RatingStore>) -> Self {
        StatisticsAggregator {
            store,
            page_size: SCAN_PAGE_SIZE
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Scans current ratings in id order, resuming each page after the last
    /// id seen. A horse recalculated mid-scan can show up twice, so only its
    /// newest row counts.
    pub async fn compute(&self) -> Result<Statistics, DatabaseError> {
        let sort = RatingSort {
            field: RatingSortField::Id,
            direction: SortDirection::Ascending
        };
        let mut latest: HashMap<i32, Rating> = HashMap::new();
        let mut filter = RatingFilter::current();
        let mut pages = 0;

        loop {
            let page = self
                .store
                .list_ratings(&filter, sort, Page::new(0, self.page_size))
                .await?;
            pages += 1;

            let Some(last) = page.last() else {
                break;
            };
            filter.after_id = Some(last.id);
            let fetched = page.len();

            for rating in page {
                // Ascending ids: a later row for the same horse is newer
                latest.insert(rating.horse_id, rating);
            }

            if fetched < self.page_size as usize {
                break;
            }
        }

        debug!(horses = latest.len(), pages, "Computed rating statistics");
        Ok(Statistics::from_ratings(latest.values()))
    }
}
