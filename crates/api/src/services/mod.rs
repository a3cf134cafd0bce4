//! Adapters for the external collaborators: admin auth, email, object storage.

pub mod admin_bootstrap;
pub mod auth;
pub mod email;
pub mod storage;

pub use auth::{AdminAccounts, AdminSession, AuthError, AuthEvent, AuthService};
pub use email::EmailService;
pub use storage::{build_object_store, HttpObjectStore, LocalObjectStore};
