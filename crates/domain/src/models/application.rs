//! Membership application domain models.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use shared::validation::{age_on, validate_birthday, validate_not_blank, validate_player_uid};

/// Review status of an application.
///
/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn is_reviewed(&self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }

    /// Only `pending -> approved` and `pending -> rejected` are legal.
    pub fn can_transition_to(&self, next: ApplicationStatus) -> bool {
        matches!(
            (self, next),
            (ApplicationStatus::Pending, ApplicationStatus::Approved)
                | (ApplicationStatus::Pending, ApplicationStatus::Rejected)
        )
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationStatus::Pending => write!(f, "pending"),
            ApplicationStatus::Approved => write!(f, "approved"),
            ApplicationStatus::Rejected => write!(f, "rejected"),
        }
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApplicationStatus::Pending),
            "approved" => Ok(ApplicationStatus::Approved),
            "rejected" => Ok(ApplicationStatus::Rejected),
            other => Err(format!("Unknown application status: {}", other)),
        }
    }
}

/// An admin decision on a pending application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn status(&self) -> ApplicationStatus {
        match self {
            Decision::Approved => ApplicationStatus::Approved,
            Decision::Rejected => ApplicationStatus::Rejected,
        }
    }
}

/// Playstyle tier chosen by the applicant. Each tier has its own entry bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Playstyle {
    Casual,
    Compe,
}

impl Playstyle {
    pub fn min_age(&self) -> i32 {
        match self {
            Playstyle::Casual => 16,
            Playstyle::Compe => 17,
        }
    }

    pub fn min_legendary_series(&self) -> i32 {
        match self {
            Playstyle::Casual => 3,
            Playstyle::Compe => 10,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Playstyle::Casual => "Casual",
            Playstyle::Compe => "Competitive",
        }
    }
}

impl std::fmt::Display for Playstyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Playstyle::Casual => write!(f, "Casual"),
            Playstyle::Compe => write!(f, "Compe"),
        }
    }
}

/// The three proof screenshots an applicant can attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenshotKind {
    FbLike,
    Profile,
    ClanJoin,
}

impl ScreenshotKind {
    pub const ALL: [ScreenshotKind; 3] = [
        ScreenshotKind::FbLike,
        ScreenshotKind::Profile,
        ScreenshotKind::ClanJoin,
    ];

    /// Form field and column name.
    pub fn field_name(&self) -> &'static str {
        match self {
            ScreenshotKind::FbLike => "fb_like_screenshot",
            ScreenshotKind::Profile => "profile_screenshot",
            ScreenshotKind::ClanJoin => "clan_join_screenshot",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.field_name() == name)
    }
}

/// Storage references for the proof screenshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotRefs {
    pub fb_like: Option<String>,
    pub profile: Option<String>,
    pub clan_join: Option<String>,
}

impl ScreenshotRefs {
    pub fn get(&self, kind: ScreenshotKind) -> Option<&str> {
        match kind {
            ScreenshotKind::FbLike => self.fb_like.as_deref(),
            ScreenshotKind::Profile => self.profile.as_deref(),
            ScreenshotKind::ClanJoin => self.clan_join.as_deref(),
        }
    }

    pub fn set(&mut self, kind: ScreenshotKind, url: String) {
        match kind {
            ScreenshotKind::FbLike => self.fb_like = Some(url),
            ScreenshotKind::Profile => self.profile = Some(url),
            ScreenshotKind::ClanJoin => self.clan_join = Some(url),
        }
    }

    /// Present references, in field order.
    pub fn urls(&self) -> Vec<&str> {
        ScreenshotKind::ALL
            .iter()
            .filter_map(|kind| self.get(*kind))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.urls().is_empty()
    }
}

/// A membership application as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Application {
    pub id: Uuid,
    /// External unique id of the applicant (their player UID).
    pub user_identifier: String,
    pub in_game_ign: String,
    pub codm_uid: String,
    pub email: String,
    pub fb_account_link: String,
    pub age: i32,
    pub birthday: NaiveDate,
    pub playstyle: Playstyle,
    pub streamer_mode: String,
    pub legendary_series: i32,
    pub can_changename: bool,
    pub changename_time_left: Option<String>,
    pub fb_like_screenshot: Option<String>,
    pub profile_screenshot: Option<String>,
    pub clan_join_screenshot: Option<String>,
    pub status: ApplicationStatus,
    pub admin_notes: Option<String>,
    /// Set exactly once, when the application leaves `pending`.
    pub reviewed_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn screenshots(&self) -> ScreenshotRefs {
        ScreenshotRefs {
            fb_like: self.fb_like_screenshot.clone(),
            profile: self.profile_screenshot.clone(),
            clan_join: self.clan_join_screenshot.clone(),
        }
    }

    pub fn has_screenshots(&self) -> bool {
        self.fb_like_screenshot.is_some()
            || self.profile_screenshot.is_some()
            || self.clan_join_screenshot.is_some()
    }

    /// Copy with every screenshot reference removed.
    pub fn without_screenshots(&self) -> Self {
        Self {
            fb_like_screenshot: None,
            profile_screenshot: None,
            clan_join_screenshot: None,
            ..self.clone()
        }
    }
}

/// Applicant-supplied fields of a submission.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ApplicationDraft {
    #[validate(
        length(max = 64, message = "In-game name must be at most 64 characters"),
        custom(function = "validate_not_blank")
    )]
    pub in_game_ign: String,

    #[validate(custom(function = "validate_player_uid"))]
    pub codm_uid: String,

    #[validate(email(message = "Invalid email address"))]
    pub email: String,

    #[validate(url(message = "Profile link must be a valid URL"))]
    pub fb_account_link: String,

    #[validate(range(min = 1, max = 120, message = "Age is out of range"))]
    pub age: i32,

    #[validate(custom(function = "validate_birthday"))]
    pub birthday: NaiveDate,

    pub playstyle: Playstyle,

    #[validate(length(min = 1, max = 32, message = "Streamer mode is required"))]
    pub streamer_mode: String,

    #[validate(range(min = 0, max = 1000, message = "Legendary series is out of range"))]
    pub legendary_series: i32,

    #[serde(default)]
    pub can_changename: bool,

    #[validate(length(max = 64))]
    pub changename_time_left: Option<String>,
}

impl ApplicationDraft {
    /// Checks the playstyle tier requirements.
    pub fn check_tier_requirements(&self) -> Result<(), String> {
        if self.age < self.playstyle.min_age() {
            return Err(format!(
                "{} players must be at least {} years old",
                self.playstyle.label(),
                self.playstyle.min_age()
            ));
        }
        if self.legendary_series < self.playstyle.min_legendary_series() {
            return Err(format!(
                "{} players need at least {} Legendary Series",
                self.playstyle.label(),
                self.playstyle.min_legendary_series()
            ));
        }
        Ok(())
    }

    /// Whether the stated age matches the birthday on any calendar date
    /// within a day of `today` (UTC). Applicants anywhere between UTC-12 and
    /// UTC+14 see one of those dates locally.
    pub fn age_matches_birthday(&self, today: NaiveDate) -> bool {
        [today.pred_opt(), Some(today), today.succ_opt()]
            .into_iter()
            .flatten()
            .any(|date| age_on(self.birthday, date) == self.age)
    }
}

/// Record handed to the table store on insert.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub user_identifier: String,
    pub draft: ApplicationDraft,
    pub screenshots: ScreenshotRefs,
}

impl NewApplication {
    pub fn new(draft: ApplicationDraft, screenshots: ScreenshotRefs) -> Self {
        Self {
            user_identifier: draft.codm_uid.trim().to_string(),
            draft,
            screenshots,
        }
    }
}

/// A screenshot file received with a submission.
#[derive(Debug, Clone)]
pub struct ScreenshotUpload {
    pub kind: ScreenshotKind,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl ScreenshotUpload {
    /// File extension from the uploaded name, lowercased. Defaults to `png`.
    pub fn extension(&self) -> String {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| "png".to_string())
    }
}

/// A row-level change delivered by the table's change feed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Insert(Application),
    Update(Application),
    Delete { id: Uuid },
}

impl ChangeEvent {
    pub fn id(&self) -> Uuid {
        match self {
            ChangeEvent::Insert(app) | ChangeEvent::Update(app) => app.id,
            ChangeEvent::Delete { id } => *id,
        }
    }
}
