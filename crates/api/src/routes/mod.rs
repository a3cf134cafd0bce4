//! HTTP route handlers.

pub mod admin_applications;
pub mod applications;
pub mod auth;
pub mod health;
pub mod roster;
