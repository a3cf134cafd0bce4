//! Admin sign-in, session and sign-out routes.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AdminAuth;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub admin_id: Uuid,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub session: SessionResponse,
}

/// POST /api/v1/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    request.validate()?;

    let signed_in = state.auth.sign_in(&request.email, &request.password).await?;

    Ok(Json(LoginResponse {
        access_token: signed_in.access_token,
        token_type: "Bearer",
        expires_in: signed_in.expires_in,
        session: SessionResponse {
            admin_id: signed_in.session.admin_id,
            email: signed_in.session.email,
            expires_at: signed_in.session.expires_at,
        },
    }))
}

/// GET /api/v1/auth/session
pub async fn session(AdminAuth(session): AdminAuth) -> Json<SessionResponse> {
    Json(SessionResponse {
        admin_id: session.admin_id,
        email: session.email,
        expires_at: session.expires_at,
    })
}

/// POST /api/v1/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    AdminAuth(session): AdminAuth,
) -> Result<StatusCode, ApiError> {
    state.auth.sign_out(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
