//! Applicant notification contracts.
//!
//! Delivery is best-effort: a failed send never reverses the state change
//! that triggered it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Decision;

/// Email template selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationTemplate {
    Submission,
    Approved,
    Rejected,
}

impl From<Decision> for NotificationTemplate {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approved => NotificationTemplate::Approved,
            Decision::Rejected => NotificationTemplate::Rejected,
        }
    }
}

impl std::fmt::Display for NotificationTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationTemplate::Submission => write!(f, "submission"),
            NotificationTemplate::Approved => write!(f, "approved"),
            NotificationTemplate::Rejected => write!(f, "rejected"),
        }
    }
}

/// Values rendered into a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContext {
    pub ign: String,
    pub admin_notes: Option<String>,
    pub invite_link: String,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Notification endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Notification transport error: {0}")]
    Transport(String),

    #[error("Notification provider not configured: {0}")]
    NotConfigured(String),
}

/// Successful outcome of a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Notifications are disabled.
    Skipped,
}

/// Outbound notification endpoint.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        template: NotificationTemplate,
        context: &NotificationContext,
    ) -> Result<Delivery, DeliveryError>;
}

/// Result of a notification attempt as reported to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationResult {
    Sent,
    Skipped,
    /// The state change stands; the admin may follow up manually.
    Failed(String),
}

impl NotificationResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationResult::Sent => "sent",
            NotificationResult::Skipped => "skipped",
            NotificationResult::Failed(_) => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, NotificationResult::Failed(_))
    }
}

impl From<Result<Delivery, DeliveryError>> for NotificationResult {
    fn from(result: Result<Delivery, DeliveryError>) -> Self {
        match result {
            Ok(Delivery::Sent) => NotificationResult::Sent,
            Ok(Delivery::Skipped) => NotificationResult::Skipped,
            Err(e) => NotificationResult::Failed(e.to_string()),
        }
    }
}
