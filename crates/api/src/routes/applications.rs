//! Public application submission.

use std::collections::HashMap;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use domain::models::{Application, ApplicationDraft, Playstyle, ScreenshotKind, ScreenshotUpload};
use tracing::info;

use crate::app::AppState;
use crate::error::ApiError;

/// Text fields and screenshot files read from a submission form.
#[derive(Debug, Default)]
struct SubmissionForm {
    fields: HashMap<String, String>,
    uploads: Vec<ScreenshotUpload>,
}

async fn read_form(mut multipart: Multipart) -> Result<SubmissionForm, ApiError> {
    let mut form = SubmissionForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().map(str::to_string).unwrap_or_default();

        if let Some(kind) = ScreenshotKind::from_field_name(&name) {
            if form.uploads.iter().any(|u| u.kind == kind) {
                return Err(ApiError::Validation(format!("Duplicate file field {}", name)));
            }
            let file_name = field.file_name().unwrap_or("upload").to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Failed to read {}: {}", name, e)))?;

            // Browsers send an empty part for untouched file inputs.
            if bytes.is_empty() {
                continue;
            }
            form.uploads.push(ScreenshotUpload {
                kind,
                file_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else if !name.is_empty() {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::Validation(format!("Failed to read {}: {}", name, e)))?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

fn required<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str, ApiError> {
    fields
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation(format!("{} is required", name)))
}

fn optional(fields: &HashMap<String, String>, name: &str) -> Option<String> {
    fields
        .get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_int(fields: &HashMap<String, String>, name: &str) -> Result<i32, ApiError> {
    required(fields, name)?
        .parse()
        .map_err(|_| ApiError::Validation(format!("{} must be a whole number", name)))
}

fn parse_flag(value: Option<&String>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("true" | "on" | "yes" | "1")
    )
}

fn parse_playstyle(value: &str) -> Result<Playstyle, ApiError> {
    match value {
        "Casual" => Ok(Playstyle::Casual),
        "Compe" => Ok(Playstyle::Compe),
        other => Err(ApiError::Validation(format!("Unknown playstyle {}", other))),
    }
}

/// Builds a draft from the text fields. Field validation happens in the lifecycle.
fn draft_from_fields(fields: &HashMap<String, String>) -> Result<ApplicationDraft, ApiError> {
    let birthday = NaiveDate::parse_from_str(required(fields, "birthday")?, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("birthday must be a date (YYYY-MM-DD)".into()))?;

    Ok(ApplicationDraft {
        in_game_ign: required(fields, "in_game_ign")?.to_string(),
        codm_uid: required(fields, "codm_uid")?.to_string(),
        email: required(fields, "email")?.to_string(),
        fb_account_link: required(fields, "fb_account_link")?.to_string(),
        age: parse_int(fields, "age")?,
        birthday,
        playstyle: parse_playstyle(required(fields, "playstyle")?)?,
        streamer_mode: required(fields, "streamer_mode")?.to_string(),
        legendary_series: parse_int(fields, "legendary_series")?,
        can_changename: parse_flag(fields.get("can_changename")),
        changename_time_left: optional(fields, "changename_time_left"),
    })
}

/// POST /api/v1/applications
pub async fn submit_application(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Application>), ApiError> {
    let form = read_form(multipart).await?;
    let draft = draft_from_fields(&form.fields)?;

    let application = state.lifecycle.submit(draft, form.uploads).await?;

    info!(
        application_id = %application.id,
        playstyle = %application.playstyle,
        "Application submitted"
    );
    Ok((StatusCode::CREATED, Json(application)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> HashMap<String, String> {
        [
            ("in_game_ign", "Ghost"),
            ("codm_uid", "6748765112867225602"),
            ("email", "ghost@example.com"),
            ("fb_account_link", "https://facebook.com/ghost"),
            ("age", "21"),
            ("birthday", "2003-04-05"),
            ("playstyle", "Compe"),
            ("streamer_mode", "Off"),
            ("legendary_series", "12"),
            ("can_changename", "yes"),
            ("changename_time_left", "  "),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_draft_from_fields() {
        let draft = draft_from_fields(&fields()).unwrap();
        assert_eq!(draft.in_game_ign, "Ghost");
        assert_eq!(draft.age, 21);
        assert_eq!(draft.birthday, NaiveDate::from_ymd_opt(2003, 4, 5).unwrap());
        assert_eq!(draft.playstyle, Playstyle::Compe);
        assert!(draft.can_changename);
        assert_eq!(draft.changename_time_left, None);
    }

    #[test]
    fn test_missing_field_rejected() {
        let mut fields = fields();
        fields.remove("email");
        let err = draft_from_fields(&fields).unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg == "email is required"));
    }

    #[test]
    fn test_bad_numbers_and_dates_rejected() {
        let mut bad_age = fields();
        bad_age.insert("age".into(), "twenty".into());
        assert!(draft_from_fields(&bad_age).is_err());

        let mut bad_date = fields();
        bad_date.insert("birthday".into(), "05/04/2003".into());
        assert!(draft_from_fields(&bad_date).is_err());

        let mut bad_style = fields();
        bad_style.insert("playstyle".into(), "Pro".into());
        assert!(draft_from_fields(&bad_style).is_err());
    }

    #[test]
    fn test_flag_parsing() {
        for value in ["true", "on", "YES", "1"] {
            assert!(parse_flag(Some(&value.to_string())), "{}", value);
        }
        assert!(!parse_flag(Some(&"no".to_string())));
        assert!(!parse_flag(None));
    }
}
