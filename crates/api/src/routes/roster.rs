//! Public roster and its admin management routes.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use domain::models::{Member, MemberInput, Roster};
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;

/// GET /api/v1/roster
pub async fn get_roster(State(state): State<AppState>) -> Result<Json<Roster>, ApiError> {
    Ok(Json(state.roster.roster().await?))
}

/// PUT /api/v1/admin/roster
pub async fn upsert_member(
    State(state): State<AppState>,
    Json(input): Json<MemberInput>,
) -> Result<Json<Member>, ApiError> {
    Ok(Json(state.roster.upsert(input).await?))
}

/// DELETE /api/v1/admin/roster/:id
pub async fn delete_member(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.roster.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
