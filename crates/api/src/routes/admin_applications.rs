//! Admin review routes: dashboard listing, decisions, refresh and the live
//! event stream.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use domain::models::{Application, Decision};
use domain::services::{DashboardRow, DashboardView, NotificationResult, StatusFilter, SyncNotice};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AdminAuth;
use crate::services::AuthEvent;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub status: StatusFilter,
}

#[derive(Debug, Deserialize, Validate)]
pub struct DecisionRequest {
    pub decision: Decision,

    #[validate(length(max = 1000, message = "Notes must be at most 1000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DecisionResponse {
    pub application: Application,
    pub notification: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub count: usize,
}

/// GET /api/v1/admin/applications
pub async fn list_applications(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<DashboardView> {
    Json(state.dashboard.render(query.status))
}

/// GET /api/v1/admin/applications/:id
pub async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DashboardRow>, ApiError> {
    state
        .dashboard
        .row(id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Application {} not found", id)))
}

/// POST /api/v1/admin/applications/:id/decision
pub async fn decide_application(
    State(state): State<AppState>,
    AdminAuth(session): AdminAuth,
    Path(id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    request.validate()?;

    let notes = request
        .notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let outcome = state.lifecycle.decide(id, request.decision, notes).await?;

    tracing::info!(
        application_id = %id,
        admin_id = %session.admin_id,
        status = %outcome.application.status,
        notification = outcome.notification.as_str(),
        "Application decided"
    );

    let notification_error = match &outcome.notification {
        NotificationResult::Failed(reason) => Some(reason.clone()),
        _ => None,
    };
    Ok(Json(DecisionResponse {
        notification: outcome.notification.as_str(),
        notification_error,
        application: outcome.application,
    }))
}

/// POST /api/v1/admin/applications/refresh
pub async fn refresh_applications(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let count = state.sync.refresh().await?;
    Ok(Json(RefreshResponse { count }))
}

#[derive(Serialize)]
struct NoticePayload<'a> {
    #[serde(flatten)]
    notice: &'a SyncNotice,
    message: String,
}

fn notice_event(notice: &SyncNotice) -> Result<Event, axum::Error> {
    let name = match notice {
        SyncNotice::Inserted { .. } => "inserted",
        SyncNotice::Updated { .. } => "updated",
        SyncNotice::Deleted { .. } => "deleted",
        SyncNotice::Refreshed { .. } => "refreshed",
    };
    Event::default().event(name).json_data(NoticePayload {
        notice,
        message: notice.message(),
    })
}

struct EventFeed {
    notices: broadcast::Receiver<SyncNotice>,
    auth: broadcast::Receiver<AuthEvent>,
    jti: String,
}

impl EventFeed {
    /// Next event to emit. `None` ends the stream.
    async fn next(&mut self) -> Option<(Result<Event, axum::Error>, bool)> {
        loop {
            // Pending notices are delivered before a sign-out closes the stream.
            tokio::select! {
                biased;
                notice = self.notices.recv() => match notice {
                    Ok(notice) => return Some((notice_event(&notice), true)),
                    Err(RecvError::Lagged(skipped)) => {
                        // Client should refetch the list.
                        let event = Event::default().event("lagged").data(skipped.to_string());
                        return Some((Ok(event), true));
                    }
                    Err(RecvError::Closed) => return None,
                },
                auth = self.auth.recv() => match auth {
                    Ok(AuthEvent::SignedOut { jti, .. }) if jti == self.jti => {
                        let event = Event::default().event("signed_out").data("session ended");
                        return Some((Ok(event), false));
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => return None,
                },
            }
        }
    }
}

/// GET /api/v1/admin/applications/events
///
/// Streams sync notices until the session signs out or the sync layer stops.
pub async fn application_events(
    State(state): State<AppState>,
    AdminAuth(session): AdminAuth,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    tracing::debug!(admin_id = %session.admin_id, "Admin event stream opened");

    let feed = EventFeed {
        notices: state.sync.subscribe(),
        auth: state.auth.subscribe(),
        jti: session.jti,
    };

    let stream = futures::stream::unfold(Some(feed), |feed| async move {
        let mut feed = feed?;
        let (event, keep_open) = feed.next().await?;
        Some((event, keep_open.then_some(feed)))
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
