//! Public clan roster models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use shared::validation::validate_not_blank;

/// Roles listed in the officers section of the roster.
pub const OFFICER_ROLES: [&str; 7] = [
    "Clan Master",
    "Vice Clan Master",
    "Tryout Handler",
    "Scrim Handler",
    "Recruiter",
    "Admin",
    "Page Handler",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: Uuid,
    pub ign: String,
    pub role: String,
    pub mode: Option<String>,
    pub description: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Member {
    pub fn is_officer(&self) -> bool {
        OFFICER_ROLES.contains(&self.role.as_str())
    }
}

/// Admin payload for creating or replacing a roster entry.
///
/// A missing `id` creates a new entry.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MemberInput {
    pub id: Option<Uuid>,

    #[validate(
        length(max = 64, message = "IGN must be at most 64 characters"),
        custom(function = "validate_not_blank")
    )]
    pub ign: String,

    #[validate(length(min = 1, max = 64, message = "Role is required"))]
    pub role: String,

    #[validate(length(max = 32))]
    pub mode: Option<String>,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    #[validate(url(message = "Photo must be a valid URL"))]
    pub photo_url: Option<String>,
}

impl MemberInput {
    /// Trims text fields and drops empty optionals.
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            id: self.id,
            ign: self.ign.trim().to_string(),
            role: self.role.trim().to_string(),
            mode: clean(self.mode),
            description: clean(self.description),
            photo_url: clean(self.photo_url),
        }
    }
}

/// Roster split for the public page.
#[derive(Debug, Clone, Serialize)]
pub struct Roster {
    pub officers: Vec<Member>,
    pub members: Vec<Member>,
    pub officer_count: usize,
    pub member_count: usize,
}

impl Roster {
    /// Splits an already ordered member list. Order is preserved within each group.
    pub fn from_members(all: Vec<Member>) -> Self {
        let (officers, members): (Vec<_>, Vec<_>) = all.into_iter().partition(Member::is_officer);
        Self {
            officer_count: officers.len(),
            member_count: members.len(),
            officers,
            members,
        }
    }
}
