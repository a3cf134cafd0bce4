//! Common test utilities for integration tests.
//!
//! Router tests run against the in-memory collaborators from `domain::testing`
//! plus an in-memory admin account store. Database tests use a real PostgreSQL
//! instance from `TEST_DATABASE_URL` and are skipped when it is not set.

// Helpers are shared by several test binaries; not every binary uses all of them.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Months, Utc};
use fake::faker::internet::en::{SafeEmail, Username};
use fake::Fake;
use clan_recruit_api::{
    app::{build_state, create_router, AppState, Collaborators},
    config::Config,
    services::AdminAccounts,
};
use domain::testing::{
    ChannelChangeFeed, FakeObjectStore, InMemoryApplicationStore, InMemoryMemberStore,
    RecordingNotifier,
};
use persistence::entities::{AdminSessionEntity, AdminUserEntity};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "integration-test-secret-0123456789";
pub const ADMIN_EMAIL: &str = "officer@example.com";
pub const ADMIN_PASSWORD: &str = "correct-horse-battery";

/// Admin accounts and sessions kept in memory.
#[derive(Default)]
pub struct InMemoryAdminAccounts {
    admins: Mutex<Vec<AdminUserEntity>>,
    sessions: Mutex<HashMap<String, AdminSessionEntity>>,
}

impl InMemoryAdminAccounts {
    pub fn session(&self, jti: &str) -> Option<AdminSessionEntity> {
        self.sessions.lock().unwrap().get(jti).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl AdminAccounts for InMemoryAdminAccounts {
    async fn find_by_email(&self, email: &str) -> Result<Option<AdminUserEntity>, sqlx::Error> {
        Ok(self
            .admins
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create_if_absent(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<AdminUserEntity>, sqlx::Error> {
        let mut admins = self.admins.lock().unwrap();
        if admins.iter().any(|a| a.email.eq_ignore_ascii_case(email)) {
            return Ok(None);
        }
        let admin = AdminUserEntity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
            last_login_at: None,
        };
        admins.push(admin.clone());
        Ok(Some(admin))
    }

    async fn touch_last_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        if let Some(admin) = self.admins.lock().unwrap().iter_mut().find(|a| a.id == id) {
            admin.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn create_session(
        &self,
        jti: &str,
        admin_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<AdminSessionEntity, sqlx::Error> {
        let session = AdminSessionEntity {
            jti: jti.to_string(),
            admin_id,
            expires_at,
            revoked_at: None,
            created_at: Utc::now(),
        };
        self.sessions
            .lock()
            .unwrap()
            .insert(jti.to_string(), session.clone());
        Ok(session)
    }

    async fn find_session(&self, jti: &str) -> Result<Option<AdminSessionEntity>, sqlx::Error> {
        Ok(self.session(jti))
    }

    async fn revoke_session(&self, jti: &str) -> Result<bool, sqlx::Error> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(jti) {
            Some(session) if session.revoked_at.is_none() => {
                session.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Test configuration signing tokens with a shared secret.
pub fn test_config() -> Config {
    test_config_with(&[])
}

pub fn test_config_with(overrides: &[(&str, &str)]) -> Config {
    let mut all = vec![
        ("jwt.secret", TEST_JWT_SECRET),
        ("storage.local_root", "./target/test-storage"),
    ];
    all.extend_from_slice(overrides);
    Config::load_for_test(&all).expect("Failed to build test config")
}

/// The app wired to in-memory collaborators the test can inspect.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub applications: Arc<InMemoryApplicationStore>,
    pub members: Arc<InMemoryMemberStore>,
    pub objects: Arc<FakeObjectStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub feed: Arc<ChannelChangeFeed>,
    pub admins: Arc<InMemoryAdminAccounts>,
}

pub async fn test_app() -> TestApp {
    test_app_with(test_config(), Arc::new(RecordingNotifier::new())).await
}

pub async fn test_app_with(config: Config, notifier: Arc<RecordingNotifier>) -> TestApp {
    let applications = Arc::new(InMemoryApplicationStore::new());
    let members = Arc::new(InMemoryMemberStore::new());
    let objects = Arc::new(FakeObjectStore::new());
    let feed = Arc::new(ChannelChangeFeed::new());
    let admins = Arc::new(InMemoryAdminAccounts::default());

    let state = build_state(
        config,
        Collaborators {
            applications: applications.clone(),
            members: members.clone(),
            objects: objects.clone(),
            notifier: notifier.clone(),
            feed: feed.clone(),
            admins: admins.clone(),
            pool: None,
        },
    )
    .await
    .expect("Failed to build app state");

    TestApp {
        router: create_router(state.clone()),
        state,
        applications,
        members,
        objects,
        notifier,
        feed,
        admins,
    }
}

impl TestApp {
    /// Sends a request and returns the status and JSON body (`Null` when empty).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    /// Creates the standard admin account and signs in. Returns the bearer token.
    pub async fn admin_token(&self) -> String {
        self.state
            .auth
            .ensure_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .expect("Failed to create admin");
        let (status, body) = self
            .send(json_request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                serde_json::json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["accessToken"]
            .as_str()
            .expect("accessToken missing")
            .to_string()
    }
}

pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).expect("Failed to build request")
}

pub fn bearer_request(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .expect("Failed to build request")
}

const BOUNDARY: &str = "clan-recruit-test-boundary";

/// Text fields of a valid casual submission for the given UID, with a
/// generated IGN and email.
pub fn submission_fields(uid: &str) -> Vec<(String, String)> {
    let age = 20;
    let birthday = Utc::now()
        .date_naive()
        .checked_sub_months(Months::new(age * 12 + 1))
        .expect("birthday");

    [
        ("in_game_ign", Username().fake::<String>()),
        ("codm_uid", uid.to_string()),
        ("email", SafeEmail().fake::<String>()),
        ("fb_account_link", "https://facebook.com/profile.php?id=100001".to_string()),
        ("age", age.to_string()),
        ("birthday", birthday.format("%Y-%m-%d").to_string()),
        ("playstyle", "Casual".to_string()),
        ("streamer_mode", "Off".to_string()),
        ("legendary_series", "5".to_string()),
        ("can_changename", "yes".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Multipart submission with the given text fields and screenshot files.
pub fn submission_request(fields: &[(String, String)], files: &[&str]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for field in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"proof.png\"\r\nContent-Type: image/png\r\n\r\n",
                BOUNDARY, field
            )
            .as_bytes(),
        );
        body.extend_from_slice(&[0x89, b'P', b'N', b'G']);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/applications")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .expect("Failed to build request")
}

/// Value of a named field built by `submission_fields`.
pub fn field<'a>(fields: &'a [(String, String)], name: &str) -> &'a str {
    fields
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
        .expect("field present")
}

pub const ALL_SCREENSHOTS: [&str; 3] = [
    "fb_like_screenshot",
    "profile_screenshot",
    "clan_join_screenshot",
];

/// Connects to the database in `TEST_DATABASE_URL` and applies migrations.
/// Returns `None` when the variable is not set.
pub async fn create_test_pool() -> Option<PgPool> {
    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    persistence::db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    Some(pool)
}
