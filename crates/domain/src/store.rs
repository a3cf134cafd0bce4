//! Collaborator contracts consumed by the domain services.
//!
//! Implementations live in `persistence` (PostgreSQL) and `api` (object
//! storage, email). In-memory versions for tests are in [`crate::testing`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{
    Application, ApplicationStatus, ChangeEvent, Member, MemberInput, NewApplication,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Conflicting record: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed for {name}: {reason}")]
    Upload { name: String, reason: String },

    #[error("Delete failed: {0}")]
    Delete(String),
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Subscribe failed: {0}")]
    Subscribe(String),

    #[error("Subscribe timed out")]
    Timeout,
}

/// Table store for membership applications.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// All applications, newest first.
    async fn list(&self) -> Result<Vec<Application>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Application>, StoreError>;

    /// The application for `user_identifier` that is pending or approved, if any.
    async fn find_active_by_user_identifier(
        &self,
        user_identifier: &str,
    ) -> Result<Option<Application>, StoreError>;

    /// Inserts a pending application. Fails with `Conflict` when an active one exists.
    async fn insert(&self, application: NewApplication) -> Result<Application, StoreError>;

    /// Sets the terminal status, review time and notes.
    ///
    /// Only applies while the row is still pending. Returns `None` when the row
    /// is absent or already reviewed.
    async fn record_decision(
        &self,
        id: Uuid,
        status: ApplicationStatus,
        notes: Option<String>,
        reviewed_at: DateTime<Utc>,
    ) -> Result<Option<Application>, StoreError>;

    /// Nulls all three screenshot references. Returns `None` when the row is absent.
    async fn clear_screenshots(&self, id: Uuid) -> Result<Option<Application>, StoreError>;
}

/// Table store for the public roster.
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// Ordered by role, then creation time.
    async fn list(&self) -> Result<Vec<Member>, StoreError>;

    /// Creates the member when `input.id` is `None` or unknown, replaces it otherwise.
    async fn upsert(&self, input: MemberInput) -> Result<Member, StoreError>;

    /// Returns `false` when no member had that id.
    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// Bucket-scoped object storage for screenshots.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores the object and returns its public URL.
    async fn upload(
        &self,
        name: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> Result<String, StorageError>;

    /// Deletes objects in one batch. Names that do not exist count as deleted.
    async fn delete(&self, names: &[String]) -> Result<(), StorageError>;
}

/// Push channel of row changes on the applications table.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// The receiver closes when the underlying channel drops.
    async fn subscribe(&self) -> Result<mpsc::Receiver<ChangeEvent>, FeedError>;
}

/// Object name of a stored screenshot: the last path segment of its URL,
/// without query string or fragment.
pub fn object_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let name = path.trim_end_matches('/').rsplit('/').next()?;
    if name.is_empty() || name.contains(':') {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_name_from_public_url() {
        let url = "https://xyz.supabase.co/storage/v1/object/public/application-screenshots/123456_profile_screenshot_1700000000000.png";
        assert_eq!(
            object_name_from_url(url).as_deref(),
            Some("123456_profile_screenshot_1700000000000.png")
        );
    }

    #[test]
    fn test_object_name_strips_query() {
        assert_eq!(
            object_name_from_url("http://localhost/files/a.jpg?token=abc#x").as_deref(),
            Some("a.jpg")
        );
    }

    #[test]
    fn test_object_name_invalid() {
        assert_eq!(object_name_from_url(""), None);
        assert_eq!(object_name_from_url("https://"), None);
    }
}
