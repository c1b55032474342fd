//! User API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{TestApp, PASSWORD};

#[tokio::test]
async fn test_get_and_update_current_user() {
    let app = TestApp::new();
    let user = app.register().await;

    let me: Value = app
        .server
        .get("/api/users/me")
        .authorization_bearer(&user.access_token)
        .await
        .json();
    assert_eq!(me["email"], user.email.as_str());

    let updated: Value = app
        .server
        .patch("/api/users/me")
        .authorization_bearer(&user.access_token)
        .json(&json!({ "display_name": "  Grace  ", "bio": "Compilers" }))
        .await
        .json();
    assert_eq!(updated["display_name"], "Grace");
    assert_eq!(updated["bio"], "Compilers");

    let cleared: Value = app
        .server
        .patch("/api/users/me")
        .authorization_bearer(&user.access_token)
        .json(&json!({ "bio": null }))
        .await
        .json();
    assert!(cleared["bio"].is_null());
    assert_eq!(cleared["display_name"], "Grace");
}

#[tokio::test]
async fn test_avatar_url_must_be_http() {
    let app = TestApp::new();
    let user = app.register().await;

    let response = app
        .server
        .patch("/api/users/me")
        .authorization_bearer(&user.access_token)
        .json(&json!({ "avatar_url": "javascript:alert(1)" }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["errors"][0]["field"], "avatar_url");
}

#[tokio::test]
async fn test_public_profile_hides_email() {
    let app = TestApp::new();
    let alice = app.register().await;
    let bob = app.register().await;

    let profile: Value = app
        .server
        .get(&format!("/api/users/{}", bob.id))
        .authorization_bearer(&alice.access_token)
        .await
        .json();

    assert_eq!(profile["username"], bob.username.as_str());
    assert!(profile.get("email").is_none());
}

#[tokio::test]
async fn test_search_by_username_prefix() {
    let app = TestApp::new();
    let user = app.register().await;
    app.register().await;

    let prefix: String = user.username.chars().take(user.username.len() - 2).collect();
    let results: Value = app
        .server
        .get("/api/users")
        .add_query_param("q", &prefix)
        .authorization_bearer(&user.access_token)
        .await
        .json();

    assert_eq!(results["total"], 1);
    assert_eq!(results["items"][0]["id"], user.id.as_str());
}

#[tokio::test]
async fn test_deactivate_revokes_access() {
    let app = TestApp::new();
    let user = app.register().await;

    app.server
        .delete("/api/users/me")
        .authorization_bearer(&user.access_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .get("/api/users/me")
        .authorization_bearer(&user.access_token)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .post("/api/auth/login")
        .json(&json!({ "email": user.email, "password": PASSWORD }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": user.refresh_token }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
