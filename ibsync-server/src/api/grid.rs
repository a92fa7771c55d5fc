//! Assignment grid endpoints
//!
//! - `GET /api/toewijzingen/grid?date=YYYY-MM-DD`: cells of one date plus staff headers
//! - `PUT /api/toewijzingen/grid`: full snapshot of one date

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use ibsync_common::api::{GridResponse, SaveGridRequest, SaveGridResponse};
use ibsync_common::time::today;
use serde::Deserialize;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Query parameters for grid reads
#[derive(Debug, Deserialize)]
pub struct GridQuery {
    /// Assignment date; today when absent
    pub date: Option<String>,
}

pub(crate) fn parse_date(raw: Option<&str>) -> ApiResult<NaiveDate> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(today()),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|_| ApiError::BadRequest(format!("Invalid date '{}', expected YYYY-MM-DD", s))),
    }
}

/// GET /api/toewijzingen/grid
pub async fn get_grid(
    State(state): State<AppState>,
    Query(query): Query<GridQuery>,
) -> ApiResult<Json<GridResponse>> {
    let date = parse_date(query.date.as_deref())?;

    let grid_cells = db::grid::load_cells(&state.db, date).await?;
    let staff_records = db::staff::load_staff(&state.db).await?;
    let saved_at = db::saved_at(&state.db, &db::grid::dataset_key(date)).await?;

    tracing::debug!(date = %date, cells = grid_cells.len(), "Serving grid");
    Ok(Json(GridResponse {
        grid_cells,
        staff_records,
        saved_at,
    }))
}

/// PUT /api/toewijzingen/grid
pub async fn put_grid(
    State(state): State<AppState>,
    Json(request): Json<SaveGridRequest>,
) -> ApiResult<Json<SaveGridResponse>> {
    if request.staff_names.is_empty() {
        return Err(ApiError::BadRequest("staffNames must not be empty".to_string()));
    }

    let (grid, staff) =
        db::grid::save_snapshot(&state.db, request.date, &request.cells, &request.staff_names)
            .await?;

    tracing::info!(
        date = %request.date,
        saved = grid.successful,
        failed = grid.failed,
        "Grid saved"
    );
    Ok(Json(SaveGridResponse { grid, staff }))
}
