//! Shared utilities for the clan recruitment backend.
//!
//! - Admin session tokens (JWT)
//! - Password hashing with Argon2id
//! - Applicant eligibility rules and field validators

pub mod jwt;
pub mod password;
pub mod validation;
