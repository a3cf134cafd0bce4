//! Repository tests against PostgreSQL.
//!
//! Run with `TEST_DATABASE_URL` pointing at a scratch database; skipped otherwise.

mod common;

use chrono::{Duration, Utc};
use common::create_test_pool;
use domain::models::{ApplicationStatus, MemberInput, NewApplication, Playstyle, ScreenshotRefs};
use domain::store::{ApplicationStore, MemberStore, StoreError};
use domain::testing::draft;
use persistence::repositories::{AdminRepository, ApplicationRepository, MemberRepository};
use uuid::Uuid;

macro_rules! pool_or_skip {
    () => {
        match create_test_pool().await {
            Some(pool) => pool,
            None => {
                eprintln!("TEST_DATABASE_URL not set, skipping");
                return;
            }
        }
    };
}

fn unique_uid() -> String {
    (100_000_000_000u128 + Uuid::new_v4().as_u128() % 899_999_999_999).to_string()
}

fn new_application(uid: &str) -> NewApplication {
    let mut d = draft(Playstyle::Casual, 20, 5);
    d.codm_uid = uid.to_string();
    NewApplication::new(
        d,
        ScreenshotRefs {
            profile: Some(format!("https://storage.test/object/public/b/{}_profile_screenshot_1.png", uid)),
            ..ScreenshotRefs::default()
        },
    )
}

#[tokio::test]
async fn test_application_round_trip() {
    let pool = pool_or_skip!();
    let repo = ApplicationRepository::new(pool);
    let uid = unique_uid();

    let created = repo.insert(new_application(&uid)).await.unwrap();
    assert_eq!(created.status, ApplicationStatus::Pending);
    assert_eq!(created.user_identifier, uid);
    assert!(created.reviewed_date.is_none());

    let active = repo.find_active_by_user_identifier(&uid).await.unwrap();
    assert_eq!(active.map(|a| a.id), Some(created.id));

    // Only one active application per applicant.
    let duplicate = repo.insert(new_application(&uid)).await;
    assert!(matches!(duplicate, Err(StoreError::Conflict(_))));

    let reviewed_at = Utc::now();
    let decided = repo
        .record_decision(
            created.id,
            ApplicationStatus::Rejected,
            Some("Try again later".to_string()),
            reviewed_at,
        )
        .await
        .unwrap()
        .expect("pending row updated");
    assert_eq!(decided.status, ApplicationStatus::Rejected);
    assert_eq!(decided.admin_notes.as_deref(), Some("Try again later"));

    // A decided row is not decided again.
    let again = repo
        .record_decision(created.id, ApplicationStatus::Approved, None, reviewed_at + Duration::minutes(1))
        .await
        .unwrap();
    assert!(again.is_none());

    let cleared = repo.clear_screenshots(created.id).await.unwrap().unwrap();
    assert!(!cleared.has_screenshots());
    assert_eq!(cleared.status, ApplicationStatus::Rejected);

    // Rejected applicants may apply again.
    let second = repo.insert(new_application(&uid)).await.unwrap();
    assert_ne!(second.id, created.id);
    assert!(repo.list().await.unwrap().iter().any(|a| a.id == second.id));
}

#[tokio::test]
async fn test_member_upsert_and_delete() {
    let pool = pool_or_skip!();
    let repo = MemberRepository::new(pool);
    let ign = format!("Member-{}", &Uuid::new_v4().to_string()[..8]);

    let created = repo
        .upsert(MemberInput {
            id: None,
            ign: ign.clone(),
            role: "Recruiter".to_string(),
            mode: Some("MP".to_string()),
            description: None,
            photo_url: None,
        })
        .await
        .unwrap();

    let updated = repo
        .upsert(MemberInput {
            id: Some(created.id),
            ign: ign.clone(),
            role: "Member".to_string(),
            mode: None,
            description: Some("Moved to the main roster".to_string()),
            photo_url: None,
        })
        .await
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.role, "Member");

    assert!(repo.list().await.unwrap().iter().any(|m| m.id == created.id));
    assert!(repo.delete(created.id).await.unwrap());
    assert!(!repo.delete(created.id).await.unwrap());
}

#[tokio::test]
async fn test_admin_sessions() {
    let pool = pool_or_skip!();
    let repo = AdminRepository::new(pool);
    let email = format!("admin-{}@example.com", Uuid::new_v4());

    let admin = repo
        .create_if_absent(&email, "$argon2id$placeholder")
        .await
        .unwrap()
        .expect("created");
    assert!(repo.create_if_absent(&email, "other").await.unwrap().is_none());

    let jti = Uuid::new_v4().to_string();
    let session = repo
        .create_session(&jti, admin.id, Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    assert!(session.is_active(Utc::now()));

    assert!(repo.revoke_session(&jti).await.unwrap());
    assert!(!repo.revoke_session(&jti).await.unwrap());
    let revoked = repo.find_session(&jti).await.unwrap().unwrap();
    assert!(!revoked.is_active(Utc::now()));
}
