//! Admin session, review dashboard and roster tests against in-memory collaborators.

mod common;

use axum::body::to_bytes;
use axum::http::{header, Method, StatusCode};
use chrono::{Duration, Utc};
use common::{
    bearer_request, get_request, json_request, submission_fields, submission_request, test_app,
    ADMIN_EMAIL, ADMIN_PASSWORD, ALL_SCREENSHOTS,
};
use domain::models::ApplicationStatus;
use domain::services::NotificationTemplate;
use domain::testing::reviewed_application;
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_health_endpoints() {
    let app = test_app().await;

    let (status, body) = app.send(get_request("/api/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["connected"], true);
    assert_eq!(body["sync"]["applications"], 0);

    let (status, body) = app.send(get_request("/api/health/live", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");

    let (status, _) = app.send(get_request("/api/health/ready", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/health/live", None))
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = test_app().await;
    app.state
        .auth
        .ensure_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
        .await
        .unwrap();

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            json!({ "email": ADMIN_EMAIL, "password": "wrong-password" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, _) = app
        .send(json_request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            json!({ "email": "nobody@example.com", "password": ADMIN_PASSWORD }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.admins.session_count(), 0);
}

#[tokio::test]
async fn test_login_validates_payload() {
    let app = test_app().await;

    let (status, body) = app
        .send(json_request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            json!({ "email": "not-an-email", "password": "" }),
        ))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_session_lifecycle() {
    let app = test_app().await;
    let token = app.admin_token().await;

    let (status, body) = app.send(get_request("/api/v1/auth/session", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], ADMIN_EMAIL);
    assert!(body["expiresAt"].is_string());

    let (status, _) = app
        .send(bearer_request(Method::POST, "/api/v1/auth/logout", &token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.send(get_request("/api/v1/auth/session", Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Session has been signed out");
}

#[tokio::test]
async fn test_admin_routes_require_session() {
    let app = test_app().await;

    for uri in [
        "/api/v1/admin/applications",
        "/api/v1/admin/applications/events",
        "/api/v1/auth/session",
    ] {
        let (status, _) = app.send(get_request(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
    }

    let (status, _) = app
        .send(get_request("/api/v1/admin/applications", Some("garbage")))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_review_flow() {
    let app = test_app().await;
    let token = app.admin_token().await;

    let (status, submitted) = app
        .send(submission_request(&submission_fields("7770001"), &ALL_SCREENSHOTS))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = submitted["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(bearer_request(Method::POST, "/api/v1/admin/applications/refresh", &token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, view) = app
        .send(get_request("/api/v1/admin/applications?status=pending", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["counts"]["pending"], 1);
    assert_eq!(view["applications"][0]["id"], id.as_str());
    assert_eq!(view["applications"][0]["status_text"], "Awaiting review");

    let (status, body) = app
        .send(json_request(
            Method::POST,
            &format!("/api/v1/admin/applications/{}/decision", id),
            Some(&token),
            json!({ "decision": "approved", "notes": "  Welcome!  " }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["application"]["status"], "approved");
    assert_eq!(body["application"]["admin_notes"], "Welcome!");
    assert!(body["application"]["reviewed_date"].is_string());
    assert_eq!(body["notification"], "sent");

    let approved = app.notifier.sent().pop().unwrap();
    assert_eq!(approved.template, NotificationTemplate::Approved);
    assert_eq!(approved.context.admin_notes.as_deref(), Some("Welcome!"));

    // A second decision is refused and the first one stands.
    let (status, body) = app
        .send(json_request(
            Method::POST,
            &format!("/api/v1/admin/applications/{}/decision", id),
            Some(&token),
            json!({ "decision": "rejected" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Application has already been approved");

    app.state.sync.refresh().await.unwrap();
    let (status, row) = app
        .send(get_request(
            &format!("/api/v1/admin/applications/{}", id),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(row["status"], "approved");
    assert_eq!(row["expiry"]["expired"], false);
    assert!(row["status_text"]
        .as_str()
        .unwrap()
        .starts_with("Images expire in 4h"));
}

#[tokio::test]
async fn test_decision_errors() {
    let app = test_app().await;
    let token = app.admin_token().await;

    let (status, _) = app
        .send(json_request(
            Method::POST,
            &format!("/api/v1/admin/applications/{}/decision", uuid::Uuid::new_v4()),
            Some(&token),
            json!({ "decision": "approved" }),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .send(get_request(
            &format!("/api/v1/admin/applications/{}", uuid::Uuid::new_v4()),
            Some(&token),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expired_screenshots_hidden_and_purged() {
    let app = test_app().await;
    let token = app.admin_token().await;
    let expired = reviewed_application(ApplicationStatus::Rejected, Utc::now() - Duration::hours(6));
    app.applications.seed(expired.clone());
    app.state.sync.refresh().await.unwrap();

    let (status, view) = app
        .send(get_request("/api/v1/admin/applications", Some(&token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let row = &view["applications"][0];
    assert_eq!(row["status_text"], "Images expired");
    assert!(row["profile_screenshot"].is_null());

    // Cleanup triggered by the render runs in the background.
    for _ in 0..50 {
        if !app.applications.get(expired.id).unwrap().has_screenshots() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(!app.applications.get(expired.id).unwrap().has_screenshots());
    assert_eq!(app.objects.delete_calls(), 1);
}

#[tokio::test]
async fn test_event_stream_ends_on_sign_out() {
    let app = test_app().await;
    let token = app.admin_token().await;

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/admin/applications/events", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    app.state.sync.refresh().await.unwrap();
    // The notice is broadcast right after the reload completes.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    let (status, _) = app
        .send(bearer_request(Method::POST, "/api/v1/auth/logout", &token))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let bytes = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("stream did not end")
    .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("event: refreshed"), "{}", text);
    assert!(text.contains("event: signed_out"), "{}", text);
}

#[tokio::test]
async fn test_roster_management() {
    let app = test_app().await;
    let token = app.admin_token().await;

    let (status, officer) = app
        .send(json_request(
            Method::PUT,
            "/api/v1/admin/roster",
            Some(&token),
            json!({ "ign": "  Alpha ", "role": "Clan Master", "mode": "BR" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", officer);
    assert_eq!(officer["ign"], "Alpha");

    let (status, _) = app
        .send(json_request(
            Method::PUT,
            "/api/v1/admin/roster",
            Some(&token),
            json!({ "ign": "Bravo", "role": "Member", "description": "" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, roster) = app.send(get_request("/api/v1/roster", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roster["officer_count"], 1);
    assert_eq!(roster["member_count"], 1);
    assert_eq!(roster["officers"][0]["ign"], "Alpha");

    let id = officer["id"].as_str().unwrap();
    let (status, _) = app
        .send(bearer_request(
            Method::DELETE,
            &format!("/api/v1/admin/roster/{}", id),
            &token,
        ))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(bearer_request(
            Method::DELETE,
            &format!("/api/v1/admin/roster/{}", id),
            &token,
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .send(json_request(
            Method::PUT,
            "/api/v1/admin/roster",
            Some(&token),
            json!({ "ign": "   ", "role": "Member" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "ign");

    let (status, _) = app
        .send(json_request(
            Method::PUT,
            "/api/v1/admin/roster",
            None,
            json!({ "ign": "Charlie", "role": "Member" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
