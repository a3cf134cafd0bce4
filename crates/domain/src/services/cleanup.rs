//! Screenshot cleanup for reviewed applications past their expiry window.
//!
//! Each application id carries a process-local marker. The marker is claimed
//! before the first await, so overlapping evaluations of the same id never
//! issue concurrent delete batches. Markers are not persisted: after a
//! restart a delete may be repeated, which object stores treat as success.
//! A `Done` marker is kept for the life of the process, so a stale snapshot
//! redelivered by the change feed never starts a second batch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::Application;
use crate::services::expiry::compute_expiry;
use crate::store::{object_name_from_url, ApplicationStore, ObjectStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CleanupState {
    InProgress,
    Done,
    /// Delete or clear failed; retried after the configured delay.
    Failed { at: Instant },
}

/// What a single evaluation did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    NotReviewed,
    NotExpired,
    NothingToDelete,
    /// Another evaluation is running or already finished for this id.
    AlreadyHandled,
    /// Last attempt failed recently.
    RetryPending,
    Cleaned { deleted: usize },
    DeleteFailed(String),
    ClearFailed(String),
}

impl CleanupOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CleanupOutcome::DeleteFailed(_) | CleanupOutcome::ClearFailed(_)
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CleanupConfig {
    pub window: Duration,
    pub retry_after: std::time::Duration,
}

/// Deletes expired screenshots and clears their references.
pub struct CleanupEngine {
    store: Arc<dyn ApplicationStore>,
    objects: Arc<dyn ObjectStore>,
    config: CleanupConfig,
    markers: Mutex<HashMap<Uuid, CleanupState>>,
}

impl CleanupEngine {
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        objects: Arc<dyn ObjectStore>,
        config: CleanupConfig,
    ) -> Self {
        Self {
            store,
            objects,
            config,
            markers: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.config.window
    }

    /// Whether `application` is a cleanup candidate at `now`, ignoring markers.
    pub fn is_due(&self, application: &Application, now: DateTime<Utc>) -> bool {
        application.status.is_reviewed()
            && application.has_screenshots()
            && compute_expiry(application.reviewed_date, now, self.config.window).expired
    }

    /// Evaluates one application. Safe to call on every render pass.
    pub async fn evaluate(&self, application: &Application, now: DateTime<Utc>) -> CleanupOutcome {
        let id = application.id;

        if !application.status.is_reviewed() {
            return CleanupOutcome::NotReviewed;
        }
        let expiry = compute_expiry(application.reviewed_date, now, self.config.window);
        if expiry.expires_at.is_none() {
            return CleanupOutcome::NotReviewed;
        }
        if !expiry.expired {
            return CleanupOutcome::NotExpired;
        }
        if !application.has_screenshots() {
            return CleanupOutcome::NothingToDelete;
        }

        if let Some(outcome) = self.claim(id) {
            return outcome;
        }

        let names: Vec<String> = application
            .screenshots()
            .urls()
            .into_iter()
            .filter_map(object_name_from_url)
            .collect();

        if names.is_empty() {
            tracing::warn!(
                application_id = %id,
                "No object names derivable from screenshot references, clearing only"
            );
        } else if let Err(e) = self.objects.delete(&names).await {
            self.mark(id, CleanupState::Failed { at: Instant::now() });
            metrics::counter!("screenshot_cleanup_failures_total", "stage" => "delete")
                .increment(1);
            tracing::warn!(application_id = %id, error = %e, "Failed to delete expired screenshots");
            return CleanupOutcome::DeleteFailed(e.to_string());
        }

        match self.store.clear_screenshots(id).await {
            Ok(_) => {
                self.mark(id, CleanupState::Done);
                metrics::counter!("screenshots_deleted_total").increment(names.len() as u64);
                tracing::info!(application_id = %id, deleted = names.len(), "Expired screenshots removed");
                CleanupOutcome::Cleaned {
                    deleted: names.len(),
                }
            }
            Err(e) => {
                self.mark(id, CleanupState::Failed { at: Instant::now() });
                metrics::counter!("screenshot_cleanup_failures_total", "stage" => "clear")
                    .increment(1);
                tracing::error!(
                    application_id = %id,
                    error = %e,
                    "Screenshots deleted but references not cleared"
                );
                CleanupOutcome::ClearFailed(e.to_string())
            }
        }
    }

    /// Evaluates every due application in `applications`, one at a time.
    pub async fn sweep(&self, applications: &[Application], now: DateTime<Utc>) -> Vec<CleanupOutcome> {
        let mut outcomes = Vec::new();
        for application in applications.iter().filter(|a| self.is_due(a, now)) {
            outcomes.push(self.evaluate(application, now).await);
        }
        outcomes
    }

    /// Runs `evaluate` on a background task.
    pub fn spawn_evaluation(self: &Arc<Self>, application: Application, now: DateTime<Utc>) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.evaluate(&application, now).await;
        });
    }

    /// Atomically takes the marker for `id`, or returns why it cannot be taken.
    fn claim(&self, id: Uuid) -> Option<CleanupOutcome> {
        let mut markers = self.markers.lock().unwrap_or_else(|e| e.into_inner());
        match markers.get(&id) {
            Some(CleanupState::InProgress) | Some(CleanupState::Done) => {
                Some(CleanupOutcome::AlreadyHandled)
            }
            Some(CleanupState::Failed { at }) if at.elapsed() < self.config.retry_after => {
                Some(CleanupOutcome::RetryPending)
            }
            _ => {
                markers.insert(id, CleanupState::InProgress);
                None
            }
        }
    }

    fn mark(&self, id: Uuid, state: CleanupState) {
        self.markers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, state);
    }

    #[cfg(test)]
    fn marker_count(&self) -> usize {
        self.markers.lock().unwrap().len()
    }
}
