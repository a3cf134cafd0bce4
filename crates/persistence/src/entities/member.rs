//! Roster member entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct MemberEntity {
    pub id: Uuid,
    pub ign: String,
    pub role: String,
    pub mode: Option<String>,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MemberEntity> for domain::models::Member {
    fn from(entity: MemberEntity) -> Self {
        Self {
            id: entity.id,
            ign: entity.ign,
            role: entity.role,
            mode: entity.mode,
            description: entity.description,
            photo_url: entity.photo_url,
            created_at: entity.created_at,
        }
    }
}
