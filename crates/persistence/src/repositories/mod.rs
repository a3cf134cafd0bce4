//! Repository implementations for database operations.

pub mod admin;
pub mod application;
pub mod member;

pub use admin::AdminRepository;
pub use application::ApplicationRepository;
pub use member::MemberRepository;

use domain::store::StoreError;

use crate::db::is_unique_violation;

/// Maps a driver error onto the domain store error.
pub(crate) fn store_error(err: sqlx::Error) -> StoreError {
    if is_unique_violation(&err) {
        StoreError::Conflict(err.to_string())
    } else {
        StoreError::Unavailable(err.to_string())
    }
}
