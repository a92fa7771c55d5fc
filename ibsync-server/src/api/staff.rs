//! Staff header endpoints

use axum::extract::State;
use axum::Json;
use ibsync_common::api::StaffRecord;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/toewijzingen/staff
pub async fn get_staff(State(state): State<AppState>) -> ApiResult<Json<Vec<StaffRecord>>> {
    Ok(Json(db::staff::load_staff(&state.db).await?))
}

/// PUT /api/toewijzingen/staff
///
/// Upserts a single `{position, name}` header.
pub async fn put_staff(
    State(state): State<AppState>,
    Json(record): Json<StaffRecord>,
) -> ApiResult<Json<StaffRecord>> {
    if record.position < 1 {
        return Err(ApiError::BadRequest(format!(
            "Invalid staff position {}",
            record.position
        )));
    }
    if record.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Staff name must not be empty".to_string()));
    }

    db::staff::upsert_staff(&state.db, &record).await?;
    tracing::info!(position = record.position, name = %record.name.trim(), "Staff header saved");
    Ok(Json(StaffRecord {
        name: record.name.trim().to_string(),
        ..record
    }))
}
