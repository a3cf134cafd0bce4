//! Common validation utilities for applicant input.

use chrono::{Datelike, NaiveDate, Utc};
use validator::ValidationError;

/// Oldest birthday accepted, in years before today.
const MAX_AGE_YEARS: i32 = 100;

/// Full years elapsed between `birthday` and `today`.
///
/// A Feb 29 birthday counts as reached on Mar 1 in non-leap years.
pub fn age_on(birthday: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birthday.year();
    if (today.month(), today.day()) < (birthday.month(), birthday.day()) {
        age -= 1;
    }
    age
}

/// Rejects strings that are empty after trimming.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}

/// Player UIDs are numeric account ids.
pub fn validate_player_uid(uid: &str) -> Result<(), ValidationError> {
    let uid = uid.trim();
    if uid.len() < 5 || uid.len() > 32 || !uid.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("player_uid");
        err.message = Some("UID must be 5 to 32 digits".into());
        return Err(err);
    }
    Ok(())
}

/// Birthday must be in the past and within a plausible range.
pub fn validate_birthday(birthday: &NaiveDate) -> Result<(), ValidationError> {
    let today = Utc::now().date_naive();
    if *birthday >= today {
        let mut err = ValidationError::new("birthday_future");
        err.message = Some("Birthday must be in the past".into());
        return Err(err);
    }
    if age_on(*birthday, today) > MAX_AGE_YEARS {
        let mut err = ValidationError::new("birthday_range");
        err.message = Some("Birthday is out of range".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        assert_eq!(age_on(date(2008, 6, 15), date(2025, 6, 14)), 16);
        assert_eq!(age_on(date(2008, 6, 15), date(2025, 6, 15)), 17);
        assert_eq!(age_on(date(2008, 6, 15), date(2025, 12, 1)), 17);
    }

    #[test]
    fn test_age_leap_day_birthday() {
        assert_eq!(age_on(date(2008, 2, 29), date(2025, 2, 28)), 16);
        assert_eq!(age_on(date(2008, 2, 29), date(2025, 3, 1)), 17);
        assert_eq!(age_on(date(2008, 2, 29), date(2024, 2, 29)), 16);
    }

    #[test]
    fn test_not_blank() {
        assert!(validate_not_blank("Ghost").is_ok());
        assert!(validate_not_blank("   ").is_err());
        assert!(validate_not_blank("").is_err());
    }

    #[test]
    fn test_player_uid() {
        assert!(validate_player_uid("6748765112867225602").is_ok());
        assert!(validate_player_uid("1234").is_err());
        assert!(validate_player_uid("12a45678").is_err());
        assert!(validate_player_uid(&"9".repeat(33)).is_err());
    }

    #[test]
    fn test_birthday_bounds() {
        let today = Utc::now().date_naive();
        assert!(validate_birthday(&date(2000, 1, 1)).is_ok());
        assert!(validate_birthday(&today).is_err());
        assert!(validate_birthday(&date(1800, 1, 1)).is_err());
    }
}
