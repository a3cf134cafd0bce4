//! Application entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::{Application, ApplicationStatus, Playstyle};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "lowercase")]
pub enum ApplicationStatusDb {
    Pending,
    Approved,
    Rejected,
}

impl From<ApplicationStatusDb> for ApplicationStatus {
    fn from(db: ApplicationStatusDb) -> Self {
        match db {
            ApplicationStatusDb::Pending => ApplicationStatus::Pending,
            ApplicationStatusDb::Approved => ApplicationStatus::Approved,
            ApplicationStatusDb::Rejected => ApplicationStatus::Rejected,
        }
    }
}

impl From<ApplicationStatus> for ApplicationStatusDb {
    fn from(status: ApplicationStatus) -> Self {
        match status {
            ApplicationStatus::Pending => ApplicationStatusDb::Pending,
            ApplicationStatus::Approved => ApplicationStatusDb::Approved,
            ApplicationStatus::Rejected => ApplicationStatusDb::Rejected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "playstyle")]
pub enum PlaystyleDb {
    Casual,
    Compe,
}

impl From<PlaystyleDb> for Playstyle {
    fn from(db: PlaystyleDb) -> Self {
        match db {
            PlaystyleDb::Casual => Playstyle::Casual,
            PlaystyleDb::Compe => Playstyle::Compe,
        }
    }
}

impl From<Playstyle> for PlaystyleDb {
    fn from(playstyle: Playstyle) -> Self {
        match playstyle {
            Playstyle::Casual => PlaystyleDb::Casual,
            Playstyle::Compe => PlaystyleDb::Compe,
        }
    }
}

/// Column list shared by every query returning [`ApplicationEntity`].
pub const APPLICATION_COLUMNS: &str = "id, user_identifier, in_game_ign, codm_uid, email, \
    fb_account_link, age, birthday, playstyle, streamer_mode, legendary_series, can_changename, \
    changename_time_left, fb_like_screenshot, profile_screenshot, clan_join_screenshot, status, \
    admin_notes, reviewed_date, created_at, updated_at";

/// Database row mapping for the applications table.
#[derive(Debug, Clone, FromRow)]
pub struct ApplicationEntity {
    pub id: Uuid,
    pub user_identifier: String,
    pub in_game_ign: String,
    pub codm_uid: String,
    pub email: String,
    pub fb_account_link: String,
    pub age: i32,
    pub birthday: NaiveDate,
    pub playstyle: PlaystyleDb,
    pub streamer_mode: String,
    pub legendary_series: i32,
    pub can_changename: bool,
    pub changename_time_left: Option<String>,
    pub fb_like_screenshot: Option<String>,
    pub profile_screenshot: Option<String>,
    pub clan_join_screenshot: Option<String>,
    pub status: ApplicationStatusDb,
    pub admin_notes: Option<String>,
    pub reviewed_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ApplicationEntity> for Application {
    fn from(entity: ApplicationEntity) -> Self {
        Self {
            id: entity.id,
            user_identifier: entity.user_identifier,
            in_game_ign: entity.in_game_ign,
            codm_uid: entity.codm_uid,
            email: entity.email,
            fb_account_link: entity.fb_account_link,
            age: entity.age,
            birthday: entity.birthday,
            playstyle: entity.playstyle.into(),
            streamer_mode: entity.streamer_mode,
            legendary_series: entity.legendary_series,
            can_changename: entity.can_changename,
            changename_time_left: entity.changename_time_left,
            fb_like_screenshot: entity.fb_like_screenshot,
            profile_screenshot: entity.profile_screenshot,
            clan_join_screenshot: entity.clan_join_screenshot,
            status: entity.status.into(),
            admin_notes: entity.admin_notes,
            reviewed_date: entity.reviewed_date,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
