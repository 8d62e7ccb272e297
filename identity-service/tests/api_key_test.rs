//! API key lifecycle over the HTTP surface.

mod common;

use axum::http::StatusCode;
use identity_service::models::{BaseRole, Capability};
use serde_json::json;

use common::{field, spawn_app, TestApp};

async fn access_token(app: &TestApp) -> String {
    app.seed_identity("sub-1", "a@example.com", BaseRole::Curator, &[])
        .await;
    let pair = app.login("sub-1", "a@example.com").await;
    field(&pair, "access_token").to_string()
}

#[tokio::test]
async fn created_key_shows_plaintext_exactly_once() {
    let app = spawn_app();
    let token = access_token(&app).await;

    let (status, created) = app
        .post_json("/keys", Some(&token), json!({ "name": "ci" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let plaintext = field(&created, "plaintext");
    assert!(plaintext.starts_with("pk_"));
    assert!(field(&created, "prefix").starts_with("pk_"));

    // The list never echoes the secret back.
    let (status, listed) = app.get("/keys", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let keys = listed.as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert!(keys[0].get("plaintext").is_none());
    assert!(keys[0].get("key_hash").is_none());
}

#[tokio::test]
async fn api_key_authenticates_with_snapshotted_scopes() {
    let app = spawn_app();
    let token = access_token(&app).await;
    let (_, created) = app
        .post_json("/keys", Some(&token), json!({ "name": "ci" }))
        .await;
    let plaintext = field(&created, "plaintext").to_string();

    let (status, me) = app.get("/users/me", Some(&plaintext)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(field(&me, "email"), "a@example.com");
    assert!(me["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p == "knowledge.write"));

    // A capability granted after issuance does not widen the key.
    use identity_service::store::CredentialStore;
    let mut identity = app
        .store
        .find_identity_by_subject("sub-1")
        .await
        .unwrap()
        .unwrap();
    identity.grant_capabilities(&[Capability::AgentAccess]);
    app.store.update_identity(&identity).await.unwrap();

    let (_, me) = app.get("/users/me", Some(&plaintext)).await;
    assert!(!me["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p == "agent.invoke"));
}

#[tokio::test]
async fn revoked_key_stops_authenticating() {
    let app = spawn_app();
    let token = access_token(&app).await;
    let (_, created) = app
        .post_json("/keys", Some(&token), json!({ "name": "ci" }))
        .await;
    let plaintext = field(&created, "plaintext").to_string();
    let key_id = field(&created, "id").to_string();

    let (status, revoked) = app.delete(&format!("/keys/{}", key_id), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(field(&revoked, "status"), "revoked");

    let (status, body) = app.get("/users/me", Some(&plaintext)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(field(&body, "failure"), "revoked");

    // Revoking twice is a conflict, not a silent success.
    let (status, _) = app.delete(&format!("/keys/{}", key_id), Some(&token)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn regenerate_swaps_the_secret_but_keeps_the_terms() {
    let app = spawn_app();
    let token = access_token(&app).await;
    let (_, created) = app
        .post_json("/keys", Some(&token), json!({ "name": "ci" }))
        .await;
    let old_plaintext = field(&created, "plaintext").to_string();
    let key_id = field(&created, "id").to_string();

    let (status, regenerated) = app
        .post_json(
            &format!("/keys/{}/regenerate", key_id),
            Some(&token),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(field(&regenerated, "name"), "ci");
    let new_plaintext = field(&regenerated, "plaintext");
    assert_ne!(new_plaintext, old_plaintext);

    let (status, _) = app.get("/users/me", Some(&old_plaintext)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get("/users/me", Some(new_plaintext)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn keys_are_owner_scoped() {
    let app = spawn_app();
    let token = access_token(&app).await;
    let (_, created) = app
        .post_json("/keys", Some(&token), json!({ "name": "ci" }))
        .await;
    let key_id = field(&created, "id").to_string();

    app.seed_identity("sub-2", "b@example.com", BaseRole::Curator, &[])
        .await;
    let other_pair = app.login("sub-2", "b@example.com").await;
    let other_token = field(&other_pair, "access_token");

    let (status, _) = app
        .delete(&format!("/keys/{}", key_id), Some(other_token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The other identity's listing stays empty.
    let (_, listed) = app.get("/keys", Some(other_token)).await;
    assert_eq!(listed.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn unknown_plaintext_is_not_found() {
    let app = spawn_app();
    let (status, body) = app
        .get("/users/me", Some("pk_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(field(&body, "failure"), "not_found");
}
