//! Admin users and session revocation.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::{AdminSessionEntity, AdminUserEntity};
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct AdminRepository {
    pool: PgPool,
}

impl AdminRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Case-insensitive lookup by email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<AdminUserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_admin_by_email");
        let result = sqlx::query_as::<_, AdminUserEntity>(
            r#"
            SELECT id, email, password_hash, created_at, last_login_at
            FROM admin_users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Creates an admin unless one with the same email exists.
    /// Returns `None` when the email was already taken.
    pub async fn create_if_absent(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<AdminUserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("create_admin_user");
        let result = sqlx::query_as::<_, AdminUserEntity>(
            r#"
            INSERT INTO admin_users (email, password_hash)
            VALUES ($1, $2)
            ON CONFLICT ((LOWER(email))) DO NOTHING
            RETURNING id, email, password_hash, created_at, last_login_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("touch_admin_last_login");
        let result = sqlx::query("UPDATE admin_users SET last_login_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn create_session(
        &self,
        jti: &str,
        admin_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<AdminSessionEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_admin_session");
        let result = sqlx::query_as::<_, AdminSessionEntity>(
            r#"
            INSERT INTO admin_sessions (jti, admin_id, expires_at)
            VALUES ($1, $2, $3)
            RETURNING jti, admin_id, expires_at, revoked_at, created_at
            "#,
        )
        .bind(jti)
        .bind(admin_id)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_session(&self, jti: &str) -> Result<Option<AdminSessionEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_admin_session");
        let result = sqlx::query_as::<_, AdminSessionEntity>(
            r#"
            SELECT jti, admin_id, expires_at, revoked_at, created_at
            FROM admin_sessions
            WHERE jti = $1
            "#,
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Marks the session revoked. Returns `false` when it was unknown or already revoked.
    pub async fn revoke_session(&self, jti: &str) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("revoke_admin_session");
        let result = sqlx::query(
            r#"
            UPDATE admin_sessions
            SET revoked_at = NOW()
            WHERE jti = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(jti)
        .execute(&self.pool)
        .await;
        timer.record();
        Ok(result?.rows_affected() > 0)
    }
}
