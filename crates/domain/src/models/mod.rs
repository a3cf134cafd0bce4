//! Domain models.

pub mod application;
pub mod member;

pub use application::{
    Application, ApplicationDraft, ApplicationStatus, ChangeEvent, Decision, NewApplication,
    Playstyle, ScreenshotKind, ScreenshotRefs, ScreenshotUpload,
};
pub use member::{Member, MemberInput, Roster, OFFICER_ROLES};
