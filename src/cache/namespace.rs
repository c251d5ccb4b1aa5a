use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumCount, EnumIter, EnumString};

use super::pattern::CachePattern;

/// Key space of a cached value. Each namespace carries its own ttl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, EnumString, EnumCount, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CacheNamespace {
    Ratings,
    Conversions,
    Statistics,
    Lists
}

impl CacheNamespace {
    pub fn key(&self, key: &str) -> String {
        format!("{self}:{key}")
    }

    pub fn pattern(&self) -> CachePattern {
        CachePattern::prefix(&format!("{self}:"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTtls {
    pub ratings: Duration,
    pub conversions: Duration,
    pub statistics: Duration,
    pub lists: Duration
}

impl CacheTtls {
    pub fn ttl(&self, namespace: CacheNamespace) -> Duration {
        match namespace {
            CacheNamespace::Ratings => self.ratings,
            CacheNamespace::Conversions => self.conversions,
            CacheNamespace::Statistics => self.statistics,
            CacheNamespace::Lists => self.lists
        }
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        CacheTtls {
            ratings: Duration::from_secs(300),
            conversions: Duration::from_secs(3600),
            statistics: Duration::from_secs(900),
            lists: Duration::from_secs(120)
        }
    }
}
