//! Domain layer for the clan recruitment backend.
//!
//! This crate contains:
//! - Domain models (Application, Member)
//! - Collaborator traits for the table store, object store, change feed and notifier
//! - Business services: application lifecycle, screenshot expiry and cleanup,
//!   dashboard synchronization, roster management

pub mod models;
pub mod services;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
