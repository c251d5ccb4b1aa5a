use std::{env, fmt::Display, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{cache::CacheTtls, model::constants::MAX_PERFORMANCES};

/// Runtime settings for [`RatingService`](crate::service::RatingService).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub cache_enabled: bool,
    pub cache_max_entries: usize,
    pub cache_ttls: CacheTtls,
    pub source_timeout: Duration,
    pub store_timeout: Duration,
    /// Performances requested from the source per calculation
    pub performance_limit: usize,
    pub monitor_sample_capacity: usize,
    pub monitor_slow_threshold: Duration
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            cache_enabled: true,
            cache_max_entries: 1000,
            cache_ttls: CacheTtls::default(),
            source_timeout: Duration::from_millis(5000),
            store_timeout: Duration::from_millis(5000),
            performance_limit: MAX_PERFORMANCES,
            monitor_sample_capacity: 1000,
            monitor_slow_threshold: Duration::from_millis(1000)
        }
    }
}

impl ServiceConfig {
    /// Reads settings from the environment, loading `.env` first when present.
    /// Missing or unparseable values keep their defaults.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let defaults = ServiceConfig::default();

        ServiceConfig {
            cache_enabled: parse_var("CACHE_ENABLED", defaults.cache_enabled),
            cache_max_entries: parse_var("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_ttls: CacheTtls {
                ratings: secs_var("CACHE_TTL_RATINGS_SECS", defaults.cache_ttls.ratings),
                conversions: secs_var("CACHE_TTL_CONVERSIONS_SECS", defaults.cache_ttls.conversions),
                statistics: secs_var("CACHE_TTL_STATISTICS_SECS", defaults.cache_ttls.statistics),
                lists: secs_var("CACHE_TTL_LISTS_SECS", defaults.cache_ttls.lists)
            },
            source_timeout: millis_var("SOURCE_TIMEOUT_MS", defaults.source_timeout),
            store_timeout: millis_var("STORE_TIMEOUT_MS", defaults.store_timeout),
            performance_limit: parse_var("PERFORMANCE_LIMIT", defaults.performance_limit),
            monitor_sample_capacity: parse_var("MONITOR_SAMPLE_CAPACITY", defaults.monitor_sample_capacity),
            monitor_slow_threshold: millis_var("MONITOR_SLOW_THRESHOLD_MS", defaults.monitor_slow_threshold)
        }
    }
}

pub(crate) fn parse_var<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display
{
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(e) => {
                warn!(variable = name, value = %raw, default = %default, error = %e, "Invalid value, using default");
                default
            }
        },
        Err(_) => default
    }
}

fn secs_var(name: &str, default: Duration) -> Duration {
    Duration::from_secs(parse_var(name, default.as_secs()))
}

fn millis_var(name: &str, default: Duration) -> Duration {
    Duration::from_millis(parse_var(name, default.as_millis() as u64))
}
