use std::sync::{Arc, Once};

use chrono::{DateTime, TimeZone, Utc};
use turf_rating::{
    config::ServiceConfig,
    database::{
        db_structs::PerformanceRecord,
        memory::{InMemoryPerformanceSource, InMemoryRatingStore}
    },
    model::structures::race_category::RaceCategory,
    service::RatingService,
    utils::test_utils::generate_performance
};

static INIT: Once = Once::new();

/// Initialize test environment with RUST_LOG=WARN
pub fn init_test_env() {
    INIT.call_once(|| {
        std::env::set_var("RUST_LOG", "warn");
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

pub fn fixed_clock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap()
}

/// `n` Group 1 wins a week apart, the latest on 2026-09-28.
pub fn group1_wins(n: usize) -> Vec<PerformanceRecord> {
    (0..n)
        .map(|i| {
            let mut performance = generate_performance(1, RaceCategory::Group1, "2026-09-28");
            performance.race_date -= chrono::Duration::days(7 * i as i64);
            performance
        })
        .collect()
}

pub struct TestService {
    pub service: RatingService,
    pub source: Arc<InMemoryPerformanceSource>,
    pub store: Arc<InMemoryRatingStore>
}

pub fn test_service() -> TestService {
    test_service_with(InMemoryPerformanceSource::new(), ServiceConfig::default())
}

pub fn test_service_with(source: InMemoryPerformanceSource, config: ServiceConfig) -> TestService {
    init_test_env();

    let source = Arc::new(source);
    let store = Arc::new(InMemoryRatingStore::new());
    let service = RatingService::new(source.clone(), store.clone(), config).with_clock(fixed_clock);

    TestService { service, source, store }
}
