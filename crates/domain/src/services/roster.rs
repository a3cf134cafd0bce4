//! Public roster management.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::models::{Member, MemberInput, Roster};
use crate::store::{MemberStore, StoreError};

#[derive(Debug, Error)]
pub enum MemberError {
    #[error("Member {0} not found")]
    NotFound(Uuid),

    #[error("Invalid member: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub struct RosterService {
    store: Arc<dyn MemberStore>,
}

impl RosterService {
    pub fn new(store: Arc<dyn MemberStore>) -> Self {
        Self { store }
    }

    pub async fn roster(&self) -> Result<Roster, MemberError> {
        Ok(Roster::from_members(self.store.list().await?))
    }

    pub async fn upsert(&self, input: MemberInput) -> Result<Member, MemberError> {
        let input = input.normalized();
        input.validate()?;

        let member = self.store.upsert(input).await?;
        tracing::info!(member_id = %member.id, role = %member.role, "Roster member saved");
        Ok(member)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), MemberError> {
        if !self.store.delete(id).await? {
            return Err(MemberError::NotFound(id));
        }
        tracing::info!(member_id = %id, "Roster member removed");
        Ok(())
    }
}
