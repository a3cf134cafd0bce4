//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod admin;
pub mod application;
pub mod member;

pub use admin::{AdminSessionEntity, AdminUserEntity};
pub use application::{ApplicationEntity, ApplicationStatusDb, PlaystyleDb};
pub use member::MemberEntity;
