//! Resident registry endpoints

use axum::extract::{Path, State};
use axum::Json;
use ibsync_common::api::{BatchOutcome, ResidentsResponse};
use ibsync_common::Resident;
use std::collections::HashSet;
use uuid::Uuid;

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/residents
pub async fn get_residents(State(state): State<AppState>) -> ApiResult<Json<ResidentsResponse>> {
    let residents = db::residents::load_residents(&state.db).await?;
    let saved_at = db::saved_at(&state.db, db::residents::DATASET).await?;
    Ok(Json(ResidentsResponse { residents, saved_at }))
}

/// GET /api/residents/:id
pub async fn get_resident(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Resident>> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid resident id '{}'", id)))?;

    db::residents::load_residents(&state.db)
        .await?
        .into_iter()
        .find(|r| r.id == id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("resident {}", id)))
}

/// PUT /api/residents
///
/// Replaces the registry. Duplicate ids reject the whole request.
pub async fn put_residents(
    State(state): State<AppState>,
    Json(residents): Json<Vec<Resident>>,
) -> ApiResult<Json<BatchOutcome>> {
    let mut seen = HashSet::new();
    if let Some(dup) = residents.iter().find(|r| !seen.insert(r.id)) {
        return Err(ApiError::BadRequest(format!("Duplicate resident id {}", dup.id)));
    }

    let outcome = db::residents::replace_residents(&state.db, &residents).await?;
    tracing::info!(count = residents.len(), "Registry saved");
    Ok(Json(outcome))
}
