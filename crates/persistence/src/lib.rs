//! Persistence layer for the clan recruitment backend.
//!
//! This crate contains:
//! - Database connection management and embedded migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations of the domain store traits
//! - The LISTEN/NOTIFY change feed for the applications table

pub mod db;
pub mod entities;
pub mod feed;
pub mod metrics;
pub mod repositories;

pub use feed::PgChangeFeed;
