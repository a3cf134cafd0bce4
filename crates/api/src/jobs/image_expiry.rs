//! Periodic screenshot expiry sweep.
//!
//! Runs the same cleanup evaluation as a dashboard render, so screenshots are
//! purged even when no admin has the dashboard open.

use std::sync::Arc;

use domain::services::{CleanupOutcome, Dashboard};

use super::scheduler::{Job, JobFrequency};

pub struct ImageExpiryJob {
    dashboard: Arc<Dashboard>,
    interval_secs: u64,
}

impl ImageExpiryJob {
    pub fn new(dashboard: Arc<Dashboard>, interval_secs: u64) -> Self {
        Self {
            dashboard,
            interval_secs,
        }
    }
}

#[async_trait::async_trait]
impl Job for ImageExpiryJob {
    fn name(&self) -> &'static str {
        "image_expiry"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    async fn execute(&self) -> Result<(), String> {
        let outcomes = self.dashboard.sweep_expired().await;

        let cleaned: usize = outcomes
            .iter()
            .filter_map(|o| match o {
                CleanupOutcome::Cleaned { deleted } => Some(*deleted),
                _ => None,
            })
            .sum();
        let failures: Vec<String> = outcomes
            .iter()
            .filter(|o| o.is_failure())
            .map(|o| format!("{:?}", o))
            .collect();

        if cleaned > 0 {
            tracing::info!(deleted = cleaned, "Expired screenshots removed");
        }

        // Failed applications are retried on a later sweep.
        if failures.is_empty() {
            Ok(())
        } else {
            Err(format!("{} cleanup(s) failed: {}", failures.len(), failures.join("; ")))
        }
    }
}
