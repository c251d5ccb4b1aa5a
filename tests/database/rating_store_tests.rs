use std::sync::Arc;

use chrono::{TimeZone, Utc};
use futures::future::join_all;
use serial_test::serial;
use turf_rating::{
    config::ServiceConfig,
    database::{
        db::DbClient,
        db_structs::{Opponent, Page, RatingFilter, RatingSort, RatingSortField, SortDirection},
        PerformanceSource, RatingStore
    },
    model::structures::{race_category::RaceCategory, rating_status::RatingStatus},
    service::RatingService,
    utils::test_utils::{generate_performance, generate_performances, generate_rating}
};

use super::test_helpers::TestDatabase;
use crate::common::{fixed_clock, group1_wins, init_test_env};

async fn setup() -> (TestDatabase, DbClient) {
    init_test_env();
    let test_db = TestDatabase::new().await.expect("Failed to create test database");
    let client = DbClient::connect(&test_db.connection_string)
        .await
        .expect("Failed to connect");

    (test_db, client)
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_fetch_recent_performances() {
    let (test_db, client) = setup().await;
    let mut performances = generate_performances(12, 3);
    performances[0].opponents = vec![Opponent {
        name: "Dubai Star".to_string(),
        position: 2,
        is_international: true,
        known_rating: Some(104.0)
    }];
    test_db.insert_performances(1, &performances).await.unwrap();

    let fetched = client.fetch_recent_performances(1, 10).await.unwrap();

    assert_eq!(fetched.len(), 10);
    assert_eq!(fetched, performances[..10].to_vec());
    assert!(client.fetch_recent_performances(2, 10).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_upsert_supersedes_current_rating() {
    let (test_db, client) = setup().await;

    let first = client
        .upsert_current_rating(5, generate_rating(5, 71.0, 62.0))
        .await
        .unwrap();
    let second = client
        .upsert_current_rating(5, generate_rating(5, 76.5, 68.0))
        .await
        .unwrap();

    assert!(second.id > first.id);
    assert_eq!(test_db.count_current(5).await.unwrap(), 1);

    let current = client.get_current_rating(5).await.unwrap().unwrap();
    assert_eq!(current, second);

    let history = client
        .list_ratings(&RatingFilter::for_horse(5), RatingSort::default(), Page::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].id, first.id);
    assert_eq!(history[1].status, RatingStatus::Superseded);
    assert!(!history[1].is_current);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_concurrent_upserts_keep_one_current() {
    let (test_db, client) = setup().await;
    let other = DbClient::connect(&test_db.connection_string)
        .await
        .expect("Failed to connect");

    let writes = (0..10).map(|i| {
        let store = if i % 2 == 0 { &client } else { &other };
        store.upsert_current_rating(9, generate_rating(9, 60.0 + i as f64, 50.0))
    });

    for result in join_all(writes).await {
        result.unwrap();
    }

    assert_eq!(test_db.count_current(9).await.unwrap(), 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_list_ratings_filter_sort_page() {
    let (_test_db, client) = setup().await;
    for (horse_id, local_rating) in [(1, 55.0), (2, 92.0), (3, 78.0), (4, 84.0)] {
        client
            .upsert_current_rating(horse_id, generate_rating(horse_id, local_rating, 60.0))
            .await
            .unwrap();
    }

    let filter = RatingFilter {
        min_rating: Some(70.0),
        ..RatingFilter::current()
    };
    let sort = RatingSort {
        field: RatingSortField::LocalRating,
        direction: SortDirection::Descending
    };

    let first_page = client.list_ratings(&filter, sort, Page::new(0, 2)).await.unwrap();
    let second_page = client.list_ratings(&filter, sort, Page::new(1, 2)).await.unwrap();

    assert_eq!(first_page.iter().map(|r| r.horse_id).collect::<Vec<_>>(), vec![2, 4]);
    assert_eq!(second_page.iter().map(|r| r.horse_id).collect::<Vec<_>>(), vec![3]);
    assert_eq!(client.get_rated_horse_ids().await.unwrap(), vec![1, 2, 3, 4]);
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_list_ratings_after_id() {
    let (_test_db, client) = setup().await;
    let mut ids = Vec::new();
    for horse_id in 1..=5 {
        let stored = client
            .upsert_current_rating(horse_id, generate_rating(horse_id, 70.0, 60.0))
            .await
            .unwrap();
        ids.push(stored.id);
    }

    let filter = RatingFilter {
        after_id: Some(ids[1]),
        ..RatingFilter::current()
    };
    let sort = RatingSort {
        field: RatingSortField::Id,
        direction: SortDirection::Ascending
    };
    let page = client.list_ratings(&filter, sort, Page::new(0, 2)).await.unwrap();

    assert_eq!(page.iter().map(|r| r.id).collect::<Vec<_>>(), ids[2..4].to_vec());
}

#[tokio::test]
#[serial]
#[ignore = "requires docker"]
async fn test_service_against_postgres() {
    let (test_db, client) = setup().await;
    test_db.insert_performances(123, &group1_wins(3)).await.unwrap();
    let client = Arc::new(client);
    let service = RatingService::new(client.clone(), client.clone(), ServiceConfig::default()).with_clock(fixed_clock);

    let rating = service.calculate_rating(123).await.unwrap();
    assert!(rating.local_rating >= 80.0);

    test_db
        .insert_performances(
            123,
            &[generate_performance(6, RaceCategory::Class1, "2026-09-30")]
        )
        .await
        .unwrap();
    let updated = service.on_new_race_result(123).await.unwrap();

    assert_eq!(updated.races_analyzed, 4);
    assert_eq!(test_db.count_current(123).await.unwrap(), 1);
    assert_eq!(service.rating_history(123).await.unwrap().len(), 2);

    let statistics = service.get_statistics().await.unwrap();
    assert_eq!(statistics.total_rated, 1);
    assert_eq!(
        client.get_current_rating(123).await.unwrap().unwrap().created_at,
        Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap()
    );
}
