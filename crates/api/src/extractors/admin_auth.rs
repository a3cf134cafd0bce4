//! Authenticated admin extractor.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::auth::bearer_token;
use crate::services::auth::AdminSession;

/// The admin behind the request. Reuses the session resolved by
/// `require_admin` when present, otherwise validates the bearer token.
#[derive(Debug, Clone)]
pub struct AdminAuth(pub AdminSession);

#[async_trait]
impl FromRequestParts<AppState> for AdminAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<AdminSession>() {
            return Ok(AdminAuth(session.clone()));
        }

        let token = bearer_token(&parts.headers)?;
        let session = state.auth.current_session(token).await?;
        Ok(AdminAuth(session))
    }
}
