//! Roster repository.

use async_trait::async_trait;
use domain::models::{Member, MemberInput};
use domain::store::{MemberStore, StoreError};
use sqlx::PgPool;
use uuid::Uuid;

use super::store_error;
use crate::entities::MemberEntity;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct MemberRepository {
    pool: PgPool,
}

impl MemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Members ordered by role, then creation time.
    pub async fn list_ordered(&self) -> Result<Vec<MemberEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_members");
        let result = sqlx::query_as::<_, MemberEntity>(
            r#"
            SELECT id, ign, role, mode, description, photo_url, created_at
            FROM members
            ORDER BY role, created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Insert, or replace every editable column when the id exists.
    pub async fn upsert_member(&self, input: &MemberInput) -> Result<MemberEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_member");
        let result = sqlx::query_as::<_, MemberEntity>(
            r#"
            INSERT INTO members (id, ign, role, mode, description, photo_url)
            VALUES (COALESCE($1, gen_random_uuid()), $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET
                ign = EXCLUDED.ign,
                role = EXCLUDED.role,
                mode = EXCLUDED.mode,
                description = EXCLUDED.description,
                photo_url = EXCLUDED.photo_url
            RETURNING id, ign, role, mode, description, photo_url, created_at
            "#,
        )
        .bind(input.id)
        .bind(&input.ign)
        .bind(&input.role)
        .bind(&input.mode)
        .bind(&input.description)
        .bind(&input.photo_url)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Returns the number of rows removed.
    pub async fn delete_member(&self, id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_member");
        let result = sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await;
        timer.record();
        Ok(result?.rows_affected())
    }
}

#[async_trait]
impl MemberStore for MemberRepository {
    async fn list(&self) -> Result<Vec<Member>, StoreError> {
        let rows = self.list_ordered().await.map_err(store_error)?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn upsert(&self, input: MemberInput) -> Result<Member, StoreError> {
        self.upsert_member(&input)
            .await
            .map(Into::into)
            .map_err(store_error)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.delete_member(id).await.map_err(store_error)? > 0)
    }
}
