//! Capability-request workflow over the HTTP surface.

mod common;

use axum::http::StatusCode;
use identity_service::models::BaseRole;
use serde_json::json;

use common::{field, spawn_app, TestApp};

async fn tokens(app: &TestApp) -> (String, String) {
    app.seed_identity("curator-sub", "c@example.com", BaseRole::Curator, &[])
        .await;
    app.seed_identity("admin-sub", "root@example.com", BaseRole::Administrator, &[])
        .await;
    let curator = app.login("curator-sub", "c@example.com").await;
    let admin = app.login("admin-sub", "root@example.com").await;
    (
        field(&curator, "access_token").to_string(),
        field(&admin, "access_token").to_string(),
    )
}

#[tokio::test]
async fn capability_request_round_trip() {
    let app = spawn_app();
    let (curator, admin) = tokens(&app).await;

    let (status, submitted) = app
        .post_json(
            "/requests",
            Some(&curator),
            json!({
                "requested_capabilities": ["agent_access", "reviewer_status"],
                "justification": "building agent-driven review tooling",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(field(&submitted, "status"), "pending");
    let request_id = field(&submitted, "id").to_string();

    let (status, decided) = app
        .post_json(
            &format!("/requests/{}/approve", request_id),
            Some(&admin),
            json!({ "notes": "approved for the pilot" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(field(&decided, "status"), "approved");

    // The curator's next rotation carries the new permissions; /users/me
    // reads the live record immediately.
    let (_, me) = app.get("/users/me", Some(&curator)).await;
    assert!(me["capabilities"]
        .as_array()
        .unwrap()
        .iter()
        .any(|c| c == "agent_access"));
}

#[tokio::test]
async fn partial_approval_records_the_granted_subset() {
    let app = spawn_app();
    let (curator, admin) = tokens(&app).await;

    let (_, submitted) = app
        .post_json(
            "/requests",
            Some(&curator),
            json!({
                "requested_capabilities": ["agent_access", "analytics_access"],
                "justification": "want both analytics and agent tooling",
            }),
        )
        .await;
    let request_id = field(&submitted, "id").to_string();

    let (status, decided) = app
        .post_json(
            &format!("/requests/{}/approve", request_id),
            Some(&admin),
            json!({
                "granted_capabilities": ["agent_access"],
                "notes": "analytics needs a separate case",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let granted = decided["granted_capabilities"].as_array().unwrap();
    assert_eq!(granted.len(), 1);
    assert_eq!(granted[0], "agent_access");
}

#[tokio::test]
async fn non_admins_cannot_decide() {
    let app = spawn_app();
    let (curator, _) = tokens(&app).await;

    let (_, submitted) = app
        .post_json(
            "/requests",
            Some(&curator),
            json!({
                "requested_capabilities": ["agent_access"],
                "justification": "agent tooling for the curation flow",
            }),
        )
        .await;
    let request_id = field(&submitted, "id").to_string();

    let (status, _) = app
        .post_json(
            &format!("/requests/{}/approve", request_id),
            Some(&curator),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn a_decided_request_cannot_be_decided_again() {
    let app = spawn_app();
    let (curator, admin) = tokens(&app).await;

    let (_, submitted) = app
        .post_json(
            "/requests",
            Some(&curator),
            json!({
                "requested_capabilities": ["agent_access"],
                "justification": "agent tooling for the curation flow",
            }),
        )
        .await;
    let request_id = field(&submitted, "id").to_string();

    let (status, _) = app
        .post_json(
            &format!("/requests/{}/approve", request_id),
            Some(&admin),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post_json(
            &format!("/requests/{}/reject", request_id),
            Some(&admin),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn role_request_from_explorator_to_curator() {
    let app = spawn_app();
    app.seed_identity("exp-sub", "e@example.com", BaseRole::Explorator, &[])
        .await;
    app.seed_identity("admin-sub", "root@example.com", BaseRole::Administrator, &[])
        .await;
    let explorator = app.login("exp-sub", "e@example.com").await;
    let admin = app.login("admin-sub", "root@example.com").await;

    let (status, submitted) = app
        .post_json(
            "/requests",
            Some(field(&explorator, "access_token")),
            json!({
                "requested_role": "curator",
                "justification": "joining the curation team next sprint",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let request_id = field(&submitted, "id").to_string();

    let (status, _) = app
        .post_json(
            &format!("/requests/{}/approve", request_id),
            Some(field(&admin, "access_token")),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // New role is live for fresh logins.
    let rotated = app.login("exp-sub", "e@example.com").await;
    let (_, me) = app
        .get("/users/me", Some(field(&rotated, "access_token")))
        .await;
    assert_eq!(field(&me, "base_role"), "curator");
}

#[tokio::test]
async fn listing_is_scoped_to_the_caller_unless_admin() {
    let app = spawn_app();
    let (curator, admin) = tokens(&app).await;

    app.post_json(
        "/requests",
        Some(&curator),
        json!({
            "requested_capabilities": ["agent_access"],
            "justification": "agent tooling for the curation flow",
        }),
    )
    .await;

    let (status, own) = app.get("/requests", Some(&curator)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own.as_array().unwrap().len(), 1);

    let (status, all_pending) = app.get("/requests?status=pending", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all_pending.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn malformed_submissions_are_rejected() {
    let app = spawn_app();
    let (curator, _) = tokens(&app).await;

    // Neither role nor capabilities.
    let (status, _) = app
        .post_json(
            "/requests",
            Some(&curator),
            json!({ "justification": "this asks for nothing at all" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Justification too short.
    let (status, _) = app
        .post_json(
            "/requests",
            Some(&curator),
            json!({
                "requested_capabilities": ["agent_access"],
                "justification": "short",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
