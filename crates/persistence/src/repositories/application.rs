//! Application repository for database operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::models::{Application, ApplicationStatus, NewApplication};
use domain::store::{ApplicationStore, StoreError};
use sqlx::PgPool;
use uuid::Uuid;

use super::store_error;
use crate::entities::application::APPLICATION_COLUMNS;
use crate::entities::{ApplicationEntity, ApplicationStatusDb, PlaystyleDb};
use crate::metrics::QueryTimer;

/// Repository for the applications table.
#[derive(Clone)]
pub struct ApplicationRepository {
    pool: PgPool,
}

impl ApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// All applications, newest first.
    pub async fn list_all(&self) -> Result<Vec<ApplicationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_applications");
        let sql = format!(
            "SELECT {} FROM applications ORDER BY created_at DESC, id",
            APPLICATION_COLUMNS
        );
        let result = sqlx::query_as::<_, ApplicationEntity>(&sql)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    pub async fn find_entity(&self, id: Uuid) -> Result<Option<ApplicationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_application_by_id");
        let sql = format!("SELECT {} FROM applications WHERE id = $1", APPLICATION_COLUMNS);
        let result = sqlx::query_as::<_, ApplicationEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// The pending or approved application for an applicant, if any.
    pub async fn find_active_entity(
        &self,
        user_identifier: &str,
    ) -> Result<Option<ApplicationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_active_application_by_user");
        let sql = format!(
            r#"
            SELECT {} FROM applications
            WHERE user_identifier = $1 AND status IN ('pending', 'approved')
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            APPLICATION_COLUMNS
        );
        let result = sqlx::query_as::<_, ApplicationEntity>(&sql)
            .bind(user_identifier)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Inserts a pending application. Fails with a unique violation when the
    /// applicant already has an active one.
    pub async fn insert_entity(
        &self,
        new: &NewApplication,
    ) -> Result<ApplicationEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_application");
        let d = &new.draft;
        let sql = format!(
            r#"
            INSERT INTO applications (
                user_identifier, in_game_ign, codm_uid, email, fb_account_link, age,
                birthday, playstyle, streamer_mode, legendary_series, can_changename,
                changename_time_left, fb_like_screenshot, profile_screenshot,
                clan_join_screenshot, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, 'pending')
            RETURNING {}
            "#,
            APPLICATION_COLUMNS
        );
        let result = sqlx::query_as::<_, ApplicationEntity>(&sql)
            .bind(&new.user_identifier)
            .bind(d.in_game_ign.trim())
            .bind(d.codm_uid.trim())
            .bind(d.email.trim())
            .bind(d.fb_account_link.trim())
            .bind(d.age)
            .bind(d.birthday)
            .bind(PlaystyleDb::from(d.playstyle))
            .bind(&d.streamer_mode)
            .bind(d.legendary_series)
            .bind(d.can_changename)
            .bind(&d.changename_time_left)
            .bind(&new.screenshots.fb_like)
            .bind(&new.screenshots.profile)
            .bind(&new.screenshots.clan_join)
            .fetch_one(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Conditional review update; matches only while the row is pending.
    pub async fn update_decision(
        &self,
        id: Uuid,
        status: ApplicationStatusDb,
        notes: Option<&str>,
        reviewed_at: DateTime<Utc>,
    ) -> Result<Option<ApplicationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_application_decision");
        let sql = format!(
            r#"
            UPDATE applications
            SET status = $2, admin_notes = $3, reviewed_date = $4
            WHERE id = $1 AND status = 'pending'
            RETURNING {}
            "#,
            APPLICATION_COLUMNS
        );
        let result = sqlx::query_as::<_, ApplicationEntity>(&sql)
            .bind(id)
            .bind(status)
            .bind(notes)
            .bind(reviewed_at)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }

    pub async fn clear_screenshot_columns(
        &self,
        id: Uuid,
    ) -> Result<Option<ApplicationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("clear_application_screenshots");
        let sql = format!(
            r#"
            UPDATE applications
            SET fb_like_screenshot = NULL, profile_screenshot = NULL, clan_join_screenshot = NULL
            WHERE id = $1
            RETURNING {}
            "#,
            APPLICATION_COLUMNS
        );
        let result = sqlx::query_as::<_, ApplicationEntity>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await;
        timer.record();
        result
    }
}

#[async_trait]
impl ApplicationStore for ApplicationRepository {
    async fn list(&self) -> Result<Vec<Application>, StoreError> {
        let rows = self.list_all().await.map_err(store_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Application>, StoreError> {
        Ok(self.find_entity(id).await.map_err(store_error)?.map(Into::into))
    }

    async fn find_active_by_user_identifier(
        &self,
        user_identifier: &str,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self
            .find_active_entity(user_identifier)
            .await
            .map_err(store_error)?
            .map(Into::into))
    }

    async fn insert(&self, application: NewApplication) -> Result<Application, StoreError> {
        self.insert_entity(&application)
            .await
            .map(Into::into)
            .map_err(store_error)
    }

    async fn record_decision(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        notes: Option<String>,
        reviewed_at: DateTime<Utc>,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self
            .update_decision(id, status.into(), notes.as_deref(), reviewed_at)
            .await
            .map_err(store_error)?
            .map(Into::into))
    }

    async fn clear_screenshots(&self, id: Uuid) -> Result<Option<Application>, StoreError> {
        Ok(self
            .clear_screenshot_columns(id)
            .await
            .map_err(store_error)?
            .map(Into::into))
    }
}
