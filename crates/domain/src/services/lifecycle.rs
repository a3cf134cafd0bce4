//! Application lifecycle: submission and admin decisions.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::models::{
    Application, ApplicationDraft, ApplicationStatus, Decision, NewApplication, ScreenshotKind,
    ScreenshotRefs, ScreenshotUpload,
};
use crate::services::notification::{
    NotificationContext, NotificationResult, NotificationTemplate, Notifier,
};
use crate::store::{ApplicationStore, ObjectStore, StorageError, StoreError};

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Invalid fields: {0}")]
    InvalidFields(#[from] ValidationErrors),

    #[error("{0}")]
    Validation(String),

    #[error("{}", duplicate_message(.status))]
    Duplicate { status: ApplicationStatus },

    #[error("Screenshot upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

fn duplicate_message(status: &ApplicationStatus) -> &'static str {
    match status {
        ApplicationStatus::Approved => "An application with this UID has already been approved",
        _ => "An application with this UID is currently pending review",
    }
}

#[derive(Debug, Error)]
pub enum DecideError {
    #[error("Application {0} not found")]
    NotFound(Uuid),

    #[error("Application has already been {status}")]
    AlreadyDecided { status: ApplicationStatus },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of a decision: the state change stands even when notification failed.
#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub application: Application,
    pub notification: NotificationResult,
}

#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Community invite link included in notifications.
    pub invite_link: String,
    /// Reject submissions missing any of the three screenshots.
    pub require_screenshots: bool,
}

/// Governs creation and review of applications.
pub struct ApplicationLifecycle {
    store: Arc<dyn ApplicationStore>,
    objects: Arc<dyn ObjectStore>,
    notifier: Arc<dyn Notifier>,
    config: LifecycleConfig,
}

impl ApplicationLifecycle {
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        objects: Arc<dyn ObjectStore>,
        notifier: Arc<dyn Notifier>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            objects,
            notifier,
            config,
        }
    }

    /// Validates and stores a new pending application.
    ///
    /// Nothing is written when validation or the duplicate check fails. When an
    /// upload fails, objects already uploaded for this submission are removed
    /// and no row is inserted.
    pub async fn submit(
        &self,
        draft: ApplicationDraft,
        uploads: Vec<ScreenshotUpload>,
    ) -> Result<Application, SubmitError> {
        draft.validate()?;
        draft
            .check_tier_requirements()
            .map_err(SubmitError::Validation)?;

        if !draft.age_matches_birthday(Utc::now().date_naive()) {
            return Err(SubmitError::Validation(
                "Age does not match birthday".to_string(),
            ));
        }

        self.check_uploads(&uploads)?;

        let user_identifier = draft.codm_uid.trim().to_string();
        if let Some(existing) = self
            .store
            .find_active_by_user_identifier(&user_identifier)
            .await
            .map_err(SubmitError::Store)?
        {
            return Err(SubmitError::Duplicate {
                status: existing.status,
            });
        }

        let (refs, uploaded) = self.upload_all(&user_identifier, uploads).await?;

        let application = match self.store.insert(NewApplication::new(draft, refs)).await {
            Ok(application) => application,
            Err(e) => {
                self.discard_uploads(&uploaded).await;
                return Err(match e {
                    StoreError::Conflict(_) => self.duplicate_after_conflict(&user_identifier).await,
                    other => SubmitError::Store(other),
                });
            }
        };

        metrics::counter!("applications_submitted_total").increment(1);
        tracing::info!(
            application_id = %application.id,
            user_identifier = %application.user_identifier,
            screenshots = uploaded.len(),
            "Application submitted"
        );

        let result: NotificationResult = self
            .notifier
            .send(
                &application.email,
                NotificationTemplate::Submission,
                &self.context(&application),
            )
            .await
            .into();
        if let NotificationResult::Failed(reason) = &result {
            metrics::counter!("notifications_failed_total", "template" => "submission")
                .increment(1);
            tracing::warn!(
                application_id = %application.id,
                reason = %reason,
                "Submission confirmation not delivered"
            );
        }

        Ok(application)
    }

    /// Records an admin decision on a pending application and notifies the applicant.
    ///
    /// A second decision on the same application fails with `AlreadyDecided`
    /// and leaves the stored status untouched.
    pub async fn decide(
        &self,
        id: Uuid,
        decision: Decision,
        notes: Option<String>,
    ) -> Result<DecisionOutcome, DecideError> {
        let current = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(DecideError::NotFound(id))?;

        if !current.status.can_transition_to(decision.status()) {
            return Err(DecideError::AlreadyDecided {
                status: current.status,
            });
        }

        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let application = match self
            .store
            .record_decision(id, decision.status(), notes, Utc::now())
            .await?
        {
            Some(application) => application,
            // Lost a race with another decision or the row went away.
            None => {
                return Err(match self.store.find_by_id(id).await? {
                    Some(other) => DecideError::AlreadyDecided {
                        status: other.status,
                    },
                    None => DecideError::NotFound(id),
                })
            }
        };

        metrics::counter!("application_decisions_total", "status" => application.status.to_string())
            .increment(1);
        tracing::info!(
            application_id = %application.id,
            status = %application.status,
            "Application reviewed"
        );

        let notification: NotificationResult = self
            .notifier
            .send(
                &application.email,
                decision.into(),
                &self.context(&application),
            )
            .await
            .into();

        if let NotificationResult::Failed(reason) = &notification {
            metrics::counter!("notifications_failed_total", "template" => decision.status().to_string())
                .increment(1);
            tracing::warn!(
                application_id = %application.id,
                reason = %reason,
                "Status updated but notification failed"
            );
        }

        Ok(DecisionOutcome {
            application,
            notification,
        })
    }

    fn context(&self, application: &Application) -> NotificationContext {
        NotificationContext {
            ign: application.in_game_ign.clone(),
            admin_notes: application.admin_notes.clone(),
            invite_link: self.config.invite_link.clone(),
        }
    }

    fn check_uploads(&self, uploads: &[ScreenshotUpload]) -> Result<(), SubmitError> {
        for (i, upload) in uploads.iter().enumerate() {
            if uploads[..i].iter().any(|u| u.kind == upload.kind) {
                return Err(SubmitError::Validation(format!(
                    "Duplicate file for {}",
                    upload.kind.field_name()
                )));
            }
            if upload.bytes.is_empty() {
                return Err(SubmitError::Validation(format!(
                    "File for {} is empty",
                    upload.kind.field_name()
                )));
            }
        }

        if self.config.require_screenshots {
            if let Some(missing) = ScreenshotKind::ALL
                .iter()
                .find(|kind| !uploads.iter().any(|u| u.kind == **kind))
            {
                return Err(SubmitError::Validation(format!(
                    "Missing required screenshot: {}",
                    missing.field_name()
                )));
            }
        }
        Ok(())
    }

    async fn upload_all(
        &self,
        user_identifier: &str,
        uploads: Vec<ScreenshotUpload>,
    ) -> Result<(ScreenshotRefs, Vec<String>), SubmitError> {
        let mut refs = ScreenshotRefs::default();
        let mut uploaded = Vec::with_capacity(uploads.len());

        for upload in uploads {
            let name = format!(
                "{}_{}_{}.{}",
                user_identifier,
                upload.kind.field_name(),
                Utc::now().timestamp_millis(),
                upload.extension()
            );

            match self
                .objects
                .upload(&name, upload.content_type.as_deref(), upload.bytes)
                .await
            {
                Ok(url) => {
                    refs.set(upload.kind, url);
                    uploaded.push(name);
                }
                Err(e) => {
                    self.discard_uploads(&uploaded).await;
                    return Err(SubmitError::Upload(e));
                }
            }
        }

        Ok((refs, uploaded))
    }

    async fn discard_uploads(&self, names: &[String]) {
        if names.is_empty() {
            return;
        }
        if let Err(e) = self.objects.delete(names).await {
            tracing::warn!(error = %e, objects = ?names, "Failed to remove orphaned screenshots");
        }
    }

    async fn duplicate_after_conflict(&self, user_identifier: &str) -> SubmitError {
        match self.store.find_active_by_user_identifier(user_identifier).await {
            Ok(Some(existing)) => SubmitError::Duplicate {
                status: existing.status,
            },
            Ok(None) => SubmitError::Duplicate {
                status: ApplicationStatus::Pending,
            },
            Err(e) => SubmitError::Store(e),
        }
    }
}
