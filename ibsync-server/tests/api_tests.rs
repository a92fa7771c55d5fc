//! HTTP API tests for ibsync-server
//!
//! Each test builds the router over a fresh in-memory database and drives it
//! with `oneshot`.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use ibsync_common::api::{
    BatchOutcome, GridCellRecord, GridResponse, ResidentsResponse, SaveGridRequest,
    SaveGridResponse, StaffRecord,
};
use ibsync_common::{CellColor, Resident};
use ibsync_server::{build_router, db, AppState};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use tower::util::ServiceExt;

async fn setup_app() -> Router {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    db::init_schema(&pool).await.expect("Schema initialization failed");
    build_router(AppState::new(pool))
}

fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn json_request<T: serde::Serialize>(method: &str, uri: &str, body: &T) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

async fn read_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn date() -> chrono::NaiveDate {
    chrono::NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
}

fn cell(row: i64, column: i64, name: &str) -> GridCellRecord {
    GridCellRecord {
        row_number: row,
        column_number: column,
        resident_name: name.to_string(),
        color_status: None,
        assignment_date: Some(date()),
    }
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup_app().await;
    let response = app.oneshot(test_request("GET", "/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: Value = read_body(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "ibsync-server");
}

#[tokio::test]
async fn test_empty_grid_has_no_saved_at() {
    let app = setup_app().await;
    let response = app
        .oneshot(test_request("GET", "/api/toewijzingen/grid?date=2024-05-06"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let grid: GridResponse = read_body(response).await;
    assert!(grid.grid_cells.is_empty());
    assert!(grid.staff_records.is_empty());
    assert!(grid.saved_at.is_none());
}

#[tokio::test]
async fn test_grid_save_then_load() {
    let app = setup_app().await;

    let mut red = cell(2, 1, "Jan Peeters");
    red.color_status = Some(CellColor::Red);
    let request = SaveGridRequest {
        date: date(),
        cells: vec![cell(1, 4, "Amina Yusuf"), red],
        staff_names: vec!["Kris B".into(), "Torben".into(), "Didar".into(), "Dorien".into()],
    };

    let response = app
        .clone()
        .oneshot(json_request("PUT", "/api/toewijzingen/grid", &request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let saved: SaveGridResponse = read_body(response).await;
    assert_eq!(saved.grid, BatchOutcome { successful: 2, failed: 0 });
    assert_eq!(saved.staff, BatchOutcome { successful: 4, failed: 0 });

    let response = app
        .oneshot(test_request("GET", "/api/toewijzingen/grid?date=2024-05-06"))
        .await
        .unwrap();
    let grid: GridResponse = read_body(response).await;
    assert_eq!(grid.grid_cells.len(), 2);
    assert_eq!(grid.grid_cells[0].resident_name, "Amina Yusuf");
    assert_eq!(grid.grid_cells[1].color_status, Some(CellColor::Red));
    assert_eq!(grid.staff_records[3], StaffRecord { position: 4, name: "Dorien".into() });
    assert!(grid.saved_at.is_some());
}

#[tokio::test]
async fn test_grid_partial_failure_is_reported() {
    let app = setup_app().await;
    let request = SaveGridRequest {
        date: date(),
        cells: vec![cell(1, 1, "Amina Yusuf"), cell(-1, 1, "Nobody")],
        staff_names: vec!["Kris B".into()],
    };

    let response = app
        .oneshot(json_request("PUT", "/api/toewijzingen/grid", &request))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let saved: SaveGridResponse = read_body(response).await;
    assert_eq!(saved.grid, BatchOutcome { successful: 1, failed: 1 });
}

#[tokio::test]
async fn test_grid_rejects_bad_date() {
    let app = setup_app().await;
    let response = app
        .oneshot(test_request("GET", "/api/toewijzingen/grid?date=6-5-2024"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json: Value = read_body(response).await;
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_staff_put_and_get() {
    let app = setup_app().await;

    for (position, name) in [(1, "Evelien"), (2, "Yasmina"), (1, " Kris B ")] {
        let record = StaffRecord { position, name: name.to_string() };
        let response = app
            .clone()
            .oneshot(json_request("PUT", "/api/toewijzingen/staff", &record))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(test_request("GET", "/api/toewijzingen/staff"))
        .await
        .unwrap();
    let staff: Vec<StaffRecord> = read_body(response).await;
    assert_eq!(
        staff,
        vec![
            StaffRecord { position: 1, name: "Kris B".into() },
            StaffRecord { position: 2, name: "Yasmina".into() },
        ]
    );
}

#[tokio::test]
async fn test_staff_rejects_invalid_position() {
    let app = setup_app().await;
    let record = StaffRecord { position: 0, name: "Nobody".into() };
    let response = app
        .oneshot(json_request("PUT", "/api/toewijzingen/staff", &record))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_residents_round_trip() {
    let app = setup_app().await;
    let amina = Resident::new("Amina", "Yusuf").with_reference_person("Dorien");
    let jan = Resident::new("Jan", "Peeters");

    let response = app
        .clone()
        .oneshot(json_request("PUT", "/api/residents", &vec![amina.clone(), jan.clone()]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let outcome: BatchOutcome = read_body(response).await;
    assert_eq!(outcome, BatchOutcome { successful: 2, failed: 0 });

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/residents"))
        .await
        .unwrap();
    let body: ResidentsResponse = read_body(response).await;
    assert_eq!(body.residents, vec![amina.clone(), jan]);
    assert!(body.saved_at.is_some());

    let response = app
        .oneshot(test_request("GET", &format!("/api/residents/{}", amina.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let loaded: Resident = read_body(response).await;
    assert_eq!(loaded.reference_person, "Dorien");
}

#[tokio::test]
async fn test_unknown_resident_is_404() {
    let app = setup_app().await;
    let uri = format!("/api/residents/{}", uuid::Uuid::new_v4());
    let response = app.oneshot(test_request("GET", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_resident_ids_rejected() {
    let app = setup_app().await;
    let amina = Resident::new("Amina", "Yusuf");

    let response = app
        .oneshot(json_request("PUT", "/api/residents", &vec![amina.clone(), amina]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
