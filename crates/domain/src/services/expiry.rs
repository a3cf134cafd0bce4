//! Screenshot expiry window.
//!
//! Screenshots of a reviewed application stay available for a fixed window
//! after the review, then get purged.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Window used when none is configured.
pub const DEFAULT_WINDOW_HOURS: i64 = 5;

/// Derived expiry state of one application. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExpiryInfo {
    /// `None` while the application is unreviewed.
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
    #[serde(rename = "remaining_seconds", serialize_with = "serialize_seconds")]
    pub remaining: Duration,
}

fn serialize_seconds<S: serde::Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(value.num_seconds())
}

impl ExpiryInfo {
    pub fn undefined() -> Self {
        Self {
            expires_at: None,
            expired: false,
            remaining: Duration::zero(),
        }
    }

    pub fn remaining_text(&self) -> String {
        format_remaining(self.remaining)
    }
}

/// Computes expiry from the review timestamp.
///
/// Expired once `now >= reviewed + window`; the boundary instant counts as expired.
pub fn compute_expiry(
    reviewed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: Duration,
) -> ExpiryInfo {
    let Some(reviewed_at) = reviewed_at else {
        return ExpiryInfo::undefined();
    };

    let expires_at = reviewed_at + window;
    let remaining = (expires_at - now).max(Duration::zero());

    ExpiryInfo {
        expires_at: Some(expires_at),
        expired: now >= expires_at,
        remaining,
    }
}

/// Whole hours and minutes, e.g. `4h 59m`. Zero or less renders as `0h`.
pub fn format_remaining(remaining: Duration) -> String {
    if remaining <= Duration::zero() {
        return "0h".to_string();
    }
    let hours = remaining.num_hours();
    let minutes = remaining.num_minutes() % 60;
    format!("{}h {}m", hours, minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window() -> Duration {
        Duration::hours(DEFAULT_WINDOW_HOURS)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_unreviewed_has_no_expiry() {
        let info = compute_expiry(None, t0(), window());
        assert_eq!(info.expires_at, None);
        assert!(!info.expired);
    }

    #[test]
    fn test_not_expired_at_review_time() {
        let info = compute_expiry(Some(t0()), t0(), window());
        assert_eq!(info.expires_at, Some(t0() + window()));
        assert!(!info.expired);
        assert_eq!(info.remaining, window());
        assert_eq!(info.remaining_text(), "5h 0m");
    }

    #[test]
    fn test_expired_at_boundary() {
        let info = compute_expiry(Some(t0()), t0() + window(), window());
        assert!(info.expired);
        assert_eq!(info.remaining, Duration::zero());
        assert_eq!(info.remaining_text(), "0h");
    }

    #[test]
    fn test_one_second_before_boundary() {
        let now = t0() + window() - Duration::seconds(1);
        let info = compute_expiry(Some(t0()), now, window());
        assert!(!info.expired);
        assert_eq!(info.remaining_text(), "0h 0m");
    }

    #[test]
    fn test_remaining_is_clamped() {
        let info = compute_expiry(Some(t0()), t0() + Duration::days(3), window());
        assert!(info.expired);
        assert_eq!(info.remaining, Duration::zero());
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::minutes(299)), "4h 59m");
        assert_eq!(format_remaining(Duration::minutes(61)), "1h 1m");
        assert_eq!(format_remaining(Duration::seconds(-5)), "0h");
    }

    #[test]
    fn test_serializes_remaining_seconds() {
        let info = compute_expiry(Some(t0()), t0() + Duration::hours(1), window());
        let json = serde_json::to_value(info).unwrap();
        assert_eq!(json["remaining_seconds"], 4 * 3600);
        assert_eq!(json["expired"], false);
    }
}
