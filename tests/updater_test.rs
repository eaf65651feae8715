// Tests for the update driver and the series repository
// Uses an in-memory SQLite pool and mockito for HTTP mocking

use chrono::NaiveDate;
use mockito::Server;
use sqlx::sqlite::SqlitePoolOptions;

use cpi_tracker_service::db::SeriesRepository;
use cpi_tracker_service::importers::{CpiPoint, CpiTableImporter, RestatementPolicy, TableImportError};
use cpi_tracker_service::updater::{self, UpdateError};

async fn create_memory_repo() -> SeriesRepository {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");
    let repo = SeriesRepository::new(pool);
    repo.ensure_schema().await.expect("Failed to create schema");
    repo
}

fn sample_series() -> Vec<CpiPoint> {
    (1..=12)
        .map(|month| CpiPoint {
            date: NaiveDate::from_ymd_opt(2020, month, 1).unwrap(),
            value: 100.0 + month as f64 / 10.0,
        })
        .collect()
}

#[tokio::test]
async fn test_insert_series_stores_points() {
    let repo = create_memory_repo().await;

    let stored = repo
        .insert_series("food_products", &sample_series())
        .await
        .unwrap();

    assert_eq!(stored, 12);
    assert_eq!(repo.count_points("food_products").await.unwrap(), 12);
    assert_eq!(repo.count_points("services").await.unwrap(), 0);
}

#[tokio::test]
async fn test_insert_series_upserts_on_rerun() {
    let repo = create_memory_repo().await;

    repo.insert_series("services", &sample_series()).await.unwrap();
    repo.insert_series("services", &sample_series()).await.unwrap();

    // Re-running an update must not duplicate rows
    assert_eq!(repo.count_points("services").await.unwrap(), 12);
}

#[tokio::test]
async fn test_update_all_rejects_missing_links() {
    let repo = create_memory_repo().await;
    let importer = CpiTableImporter::new(RestatementPolicy::Exclude);

    // Three links for four categories: a plain zip would silently drop the
    // trailing category, so this must be a hard error
    let links: Vec<String> = (0..3)
        .map(|i| format!("http://localhost/storage/mediabank/aaaa000{i}/t{i}.xlsx"))
        .collect();
    let result = updater::update_all(&importer, &repo, &links).await;

    match result {
        Err(UpdateError::LinkCountMismatch { expected, actual }) => {
            assert_eq!(expected, 4);
            assert_eq!(actual, 3);
        }
        other => panic!("Expected LinkCountMismatch, got {other:?}"),
    }
    assert_eq!(repo.count_points("goods_and_services").await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_all_fails_fast_on_unparseable_spreadsheet() {
    let mut server = Server::new_async().await;
    let repo = create_memory_repo().await;
    let importer =
        CpiTableImporter::with_client(reqwest::Client::new(), RestatementPolicy::Exclude);

    // First table body is not an xlsx workbook; the run aborts there and the
    // remaining links are never fetched
    let first = server
        .mock("GET", "/t0.xlsx")
        .with_status(200)
        .with_body(b"not a spreadsheet".to_vec())
        .create_async()
        .await;
    let second = server
        .mock("GET", "/t1.xlsx")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let links: Vec<String> = (0..4).map(|i| format!("{}/t{i}.xlsx", server.url())).collect();
    let result = updater::update_all(&importer, &repo, &links).await;

    assert!(matches!(
        result,
        Err(UpdateError::Import(TableImportError::Format(_)))
    ));
    assert_eq!(repo.count_points("goods_and_services").await.unwrap(), 0);

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn test_update_all_http_error_propagates() {
    let mut server = Server::new_async().await;
    let repo = create_memory_repo().await;
    let importer =
        CpiTableImporter::with_client(reqwest::Client::new(), RestatementPolicy::Exclude);

    let mock = server
        .mock("GET", "/t0.xlsx")
        .with_status(404)
        .create_async()
        .await;

    let links: Vec<String> = (0..4).map(|i| format!("{}/t{i}.xlsx", server.url())).collect();
    let result = updater::update_all(&importer, &repo, &links).await;

    assert!(matches!(
        result,
        Err(UpdateError::Import(TableImportError::Http(_)))
    ));
    mock.assert_async().await;
}
