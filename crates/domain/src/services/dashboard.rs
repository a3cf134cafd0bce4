//! Admin dashboard view over the mirrored applications.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Application, ApplicationStatus};
use crate::services::cleanup::{CleanupEngine, CleanupOutcome};
use crate::services::expiry::{compute_expiry, ExpiryInfo};
use crate::services::sync::ApplicationMirror;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Approved,
    Rejected,
}

impl StatusFilter {
    pub fn matches(&self, status: ApplicationStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => status == ApplicationStatus::Pending,
            StatusFilter::Approved => status == ApplicationStatus::Approved,
            StatusFilter::Rejected => status == ApplicationStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn tally(applications: &[Application]) -> Self {
        applications.iter().fold(Self::default(), |mut counts, app| {
            counts.total += 1;
            match app.status {
                ApplicationStatus::Pending => counts.pending += 1,
                ApplicationStatus::Approved => counts.approved += 1,
                ApplicationStatus::Rejected => counts.rejected += 1,
            }
            counts
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardRow {
    #[serde(flatten)]
    pub application: Application,
    pub expiry: ExpiryInfo,
    pub status_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub applications: Vec<DashboardRow>,
    pub counts: StatusCounts,
}

/// Builds a row. Screenshot URLs of expired reviewed applications are withheld.
pub fn dashboard_row(application: &Application, now: DateTime<Utc>, window: Duration) -> DashboardRow {
    let expiry = compute_expiry(application.reviewed_date, now, window);

    let (application, status_text) = if !application.status.is_reviewed() {
        (application.clone(), "Awaiting review".to_string())
    } else if expiry.expired {
        (application.without_screenshots(), "Images expired".to_string())
    } else {
        (
            application.clone(),
            format!("Images expire in {}", expiry.remaining_text()),
        )
    };

    DashboardRow {
        application,
        expiry,
        status_text,
    }
}

/// Renders views from the mirror and triggers cleanup for expired rows.
pub struct Dashboard {
    mirror: Arc<ApplicationMirror>,
    cleanup: Arc<CleanupEngine>,
}

impl Dashboard {
    pub fn new(mirror: Arc<ApplicationMirror>, cleanup: Arc<CleanupEngine>) -> Self {
        Self { mirror, cleanup }
    }

    /// One render pass. Cleanup for due applications runs in the background.
    pub fn render(&self, filter: StatusFilter) -> DashboardView {
        let now = Utc::now();
        let snapshot = self.mirror.snapshot();
        let window = self.cleanup.window();

        let applications = snapshot
            .iter()
            .filter(|app| filter.matches(app.status))
            .map(|app| dashboard_row(app, now, window))
            .collect();

        for app in snapshot.iter().filter(|a| self.cleanup.is_due(a, now)) {
            self.cleanup.spawn_evaluation(app.clone(), now);
        }

        DashboardView {
            applications,
            counts: StatusCounts::tally(&snapshot),
        }
    }

    /// Single application row, if mirrored.
    pub fn row(&self, id: uuid::Uuid) -> Option<DashboardRow> {
        self.mirror
            .get(id)
            .map(|app| dashboard_row(&app, Utc::now(), self.cleanup.window()))
    }

    /// Evaluates cleanup for every mirrored application and waits for the results.
    pub async fn sweep_expired(&self) -> Vec<CleanupOutcome> {
        self.cleanup.sweep(&self.mirror.snapshot(), Utc::now()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cleanup::CleanupConfig;
    use crate::testing::{
        reviewed_application, stored_application, FakeObjectStore, InMemoryApplicationStore,
    };

    fn window() -> Duration {
        Duration::hours(5)
    }

    #[test]
    fn test_status_texts() {
        let now = Utc::now();
        let pending = stored_application(ApplicationStatus::Pending);
        let fresh = reviewed_application(ApplicationStatus::Approved, now - Duration::minutes(61));
        let old = reviewed_application(ApplicationStatus::Rejected, now - Duration::hours(5));

        assert_eq!(dashboard_row(&pending, now, window()).status_text, "Awaiting review");
        assert_eq!(
            dashboard_row(&fresh, now, window()).status_text,
            "Images expire in 3h 59m"
        );

        let expired = dashboard_row(&old, now, window());
        assert_eq!(expired.status_text, "Images expired");
        assert!(expired.expiry.expired);
        assert!(!expired.application.has_screenshots());
    }

    #[test]
    fn test_filter_and_counts() {
        let apps = vec![
            stored_application(ApplicationStatus::Pending),
            stored_application(ApplicationStatus::Pending),
            reviewed_application(ApplicationStatus::Approved, Utc::now()),
            reviewed_application(ApplicationStatus::Rejected, Utc::now()),
        ];
        let counts = StatusCounts::tally(&apps);
        assert_eq!(
            counts,
            StatusCounts {
                total: 4,
                pending: 2,
                approved: 1,
                rejected: 1
            }
        );
        assert_eq!(
            apps.iter()
                .filter(|a| StatusFilter::Pending.matches(a.status))
                .count(),
            2
        );
        assert!(StatusFilter::All.matches(ApplicationStatus::Rejected));
    }

    #[test]
    fn test_filter_deserializes_lowercase() {
        let filter: StatusFilter = serde_json::from_str("\"approved\"").unwrap();
        assert_eq!(filter, StatusFilter::Approved);
    }

    #[tokio::test]
    async fn test_sweep_cleans_expired_mirror_entries() {
        let store = Arc::new(InMemoryApplicationStore::new());
        let objects = Arc::new(FakeObjectStore::new());
        let engine = Arc::new(CleanupEngine::new(
            store.clone(),
            objects.clone(),
            CleanupConfig {
                window: window(),
                retry_after: std::time::Duration::from_secs(60),
            },
        ));

        let expired = reviewed_application(ApplicationStatus::Approved, Utc::now() - Duration::hours(6));
        store.seed(expired.clone());
        let mirror = Arc::new(ApplicationMirror::new());
        mirror.replace(vec![expired.clone(), stored_application(ApplicationStatus::Pending)]);

        let dashboard = Dashboard::new(mirror, engine);
        let outcomes = dashboard.sweep_expired().await;

        assert_eq!(outcomes, vec![CleanupOutcome::Cleaned { deleted: 3 }]);
        assert!(!store.get(expired.id).unwrap().has_screenshots());

        // The render pass reuses the marker and never deletes twice.
        let view = dashboard.render(StatusFilter::All);
        assert_eq!(view.counts.total, 2);
        tokio::task::yield_now().await;
        assert_eq!(objects.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_render_spawns_cleanup() {
        let store = Arc::new(InMemoryApplicationStore::new());
        let objects = Arc::new(FakeObjectStore::new());
        let engine = Arc::new(CleanupEngine::new(
            store.clone(),
            objects.clone(),
            CleanupConfig {
                window: window(),
                retry_after: std::time::Duration::from_secs(60),
            },
        ));
        let expired = reviewed_application(ApplicationStatus::Rejected, Utc::now() - Duration::hours(7));
        store.seed(expired.clone());
        let mirror = Arc::new(ApplicationMirror::new());
        mirror.replace(vec![expired.clone()]);

        let dashboard = Dashboard::new(mirror, engine);
        let view = dashboard.render(StatusFilter::Rejected);
        let _ = dashboard.render(StatusFilter::Rejected);
        assert_eq!(view.applications.len(), 1);
        assert_eq!(view.applications[0].status_text, "Images expired");

        for _ in 0..50 {
            if !store.get(expired.id).unwrap().has_screenshots() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert!(!store.get(expired.id).unwrap().has_screenshots());
        assert_eq!(objects.delete_calls(), 1);
    }
}
