//! ibsync-server library - remote store for the assignment sync engine
//!
//! Serves the assignment grid (per date), the staff headers and the resident
//! registry over HTTP, backed by SQLite.

use axum::Router;
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;

pub use error::{ApiError, ApiResult};

/// Default listen port
pub const DEFAULT_PORT: u16 = 5740;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let api = Router::new()
        .route(
            "/api/toewijzingen/grid",
            get(api::get_grid).put(api::put_grid),
        )
        .route(
            "/api/toewijzingen/staff",
            get(api::get_staff).put(api::put_staff),
        )
        .route(
            "/api/residents",
            get(api::get_residents).put(api::put_residents),
        )
        .route("/api/residents/:id", get(api::get_resident));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
