//! Domain services for the clan recruitment backend.
//!
//! Services contain business logic that operates on domain models through the
//! collaborator traits in [`crate::store`].

pub mod cleanup;
pub mod dashboard;
pub mod expiry;
pub mod lifecycle;
pub mod notification;
pub mod roster;
pub mod sync;

pub use cleanup::{CleanupConfig, CleanupEngine, CleanupOutcome};
pub use dashboard::{Dashboard, DashboardRow, DashboardView, StatusCounts, StatusFilter};
pub use expiry::{compute_expiry, format_remaining, ExpiryInfo, DEFAULT_WINDOW_HOURS};
pub use lifecycle::{
    ApplicationLifecycle, DecideError, DecisionOutcome, LifecycleConfig, SubmitError,
};
pub use notification::{
    Delivery, DeliveryError, NotificationContext, NotificationResult, NotificationTemplate,
    Notifier,
};
pub use roster::{MemberError, RosterService};
pub use sync::{ApplicationMirror, SyncConfig, SyncHandle, SyncMode, SyncNotice};
