//! Authentication API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{TestApp, PASSWORD};

#[tokio::test]
async fn test_register_returns_user_and_tokens() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "username": "ada",
            "email": "ada@example.com",
            "password": "correct horse battery",
            "display_name": "Ada"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["user"]["username"], "ada");
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["token_type"], "Bearer");
    assert!(body["access_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["refresh_token"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(body["user"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_register_duplicate_email_conflicts() {
    let app = TestApp::new();
    let user = app.register().await;

    let response = app
        .server
        .post("/api/auth/register")
        .json(&json!({
            "username": "someone_else",
            "email": user.email,
            "password": PASSWORD
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
    let body: Value = response.json();
    assert_eq!(body["code"], 10005);
}

#[tokio::test]
async fn test_register_validation_errors_are_422() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/auth/register")
        .json(&json!({ "username": "a", "email": "nope", "password": "short" }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json();
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["email", "password", "username"]);
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let app = TestApp::new();

    let response = app
        .server
        .post("/api/auth/login")
        .content_type("application/json")
        .bytes("{\"email\": ".into())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_login_and_me() {
    let app = TestApp::new();
    let user = app.register().await;

    let response = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": user.email, "password": PASSWORD }))
        .await;
    response.assert_status_ok();
    let token = response.json::<Value>()["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let me: Value = app
        .server
        .get("/api/auth/me")
        .authorization_bearer(&token)
        .await
        .json();
    assert_eq!(me["id"], user.id.as_str());
    assert_eq!(me["username"], user.username.as_str());
}

#[tokio::test]
async fn test_login_with_wrong_password_is_401() {
    let app = TestApp::new();
    let user = app.register().await;

    app.server
        .post("/api/auth/login")
        .json(&json!({ "email": user.email, "password": "not-the-password" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_protected_routes_require_bearer_token() {
    let app = TestApp::new();

    app.server
        .get("/api/auth/me")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .get("/api/teams")
        .authorization_bearer("not-a-jwt")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rotates_token() {
    let app = TestApp::new();
    let user = app.register().await;

    let response = app
        .server
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": user.refresh_token }))
        .await;
    response.assert_status_ok();
    let rotated = response.json::<Value>()["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(rotated, user.refresh_token);

    // The presented token is spent
    app.server
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": user.refresh_token }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    app.server
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": rotated }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_logout_revokes_refresh_token() {
    let app = TestApp::new();
    let user = app.register().await;

    app.server
        .post("/api/auth/logout")
        .json(&json!({ "refresh_token": user.refresh_token }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": user.refresh_token }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Logging out twice is harmless
    app.server
        .post("/api/auth/logout")
        .json(&json!({ "refresh_token": user.refresh_token }))
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_change_password() {
    let app = TestApp::new();
    let user = app.register().await;

    app.server
        .post("/api/auth/change-password")
        .authorization_bearer(&user.access_token)
        .json(&json!({ "current_password": "wrong-password", "new_password": "brand-new-secret" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    app.server
        .post("/api/auth/change-password")
        .authorization_bearer(&user.access_token)
        .json(&json!({ "current_password": PASSWORD, "new_password": "brand-new-secret" }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .post("/api/auth/refresh")
        .json(&json!({ "refresh_token": user.refresh_token }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    app.server
        .post("/api/auth/login")
        .json(&json!({ "email": user.email, "password": "brand-new-secret" }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_logout_all_revokes_every_session() {
    let app = TestApp::new();
    let user = app.register().await;
    let second: Value = app
        .server
        .post("/api/auth/login")
        .json(&json!({ "email": user.email, "password": PASSWORD }))
        .await
        .json();

    app.server
        .post("/api/auth/logout-all")
        .authorization_bearer(&user.access_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    for token in [user.refresh_token.as_str(), second["refresh_token"].as_str().unwrap()] {
        app.server
            .post("/api/auth/refresh")
            .json(&json!({ "refresh_token": token }))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }
}
