//! Team API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::TestApp;

#[tokio::test]
async fn test_create_team_makes_caller_owner() {
    let app = TestApp::new();
    let owner = app.register().await;

    let team = app.create_team(&owner, "  Platform  ").await;

    assert_eq!(team["name"], "Platform");
    assert_eq!(team["owner_id"], owner.id.as_str());
    assert_eq!(team["members"][0]["user_id"], owner.id.as_str());
    assert_eq!(team["members"][0]["role"], "owner");
}

#[tokio::test]
async fn test_list_teams_only_returns_memberships() {
    let app = TestApp::new();
    let alice = app.register().await;
    let bob = app.register().await;
    app.create_team(&alice, "Alpha").await;
    app.create_team(&bob, "Beta").await;

    let teams: Vec<Value> = app
        .server
        .get("/api/teams")
        .authorization_bearer(&alice.access_token)
        .await
        .json();

    assert_eq!(teams.len(), 1);
    assert_eq!(teams[0]["name"], "Alpha");
}

#[tokio::test]
async fn test_outsider_gets_forbidden() {
    let app = TestApp::new();
    let owner = app.register().await;
    let outsider = app.register().await;
    let team = app.create_team(&owner, "Private").await;
    let team_id = team["id"].as_str().unwrap();

    app.server
        .get(&format!("/api/teams/{}", team_id))
        .authorization_bearer(&outsider.access_token)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_and_malformed_team_ids() {
    let app = TestApp::new();
    let owner = app.register().await;

    app.server
        .get("/api/teams/123456789")
        .authorization_bearer(&owner.access_token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .get("/api/teams/not-an-id")
        .authorization_bearer(&owner.access_token)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_member_management() {
    let app = TestApp::new();
    let owner = app.register().await;
    let member = app.register().await;
    let team = app.create_team(&owner, "Core").await;
    let team_id = team["id"].as_str().unwrap();

    app.add_team_member(&owner, team_id, &member).await;

    // Adding twice conflicts
    app.server
        .post(&format!("/api/teams/{}/members", team_id))
        .authorization_bearer(&owner.access_token)
        .json(&json!({ "user_id": member.id }))
        .await
        .assert_status(StatusCode::CONFLICT);

    // Plain members cannot manage the team
    app.server
        .patch(&format!("/api/teams/{}", team_id))
        .authorization_bearer(&member.access_token)
        .json(&json!({ "name": "Hijacked" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let promoted: Value = app
        .server
        .patch(&format!("/api/teams/{}/members/{}", team_id, member.id))
        .authorization_bearer(&owner.access_token)
        .json(&json!({ "role": "admin" }))
        .await
        .json();
    assert_eq!(promoted["role"], "admin");

    let updated: Value = app
        .server
        .patch(&format!("/api/teams/{}", team_id))
        .authorization_bearer(&member.access_token)
        .json(&json!({ "description": "Core services" }))
        .await
        .json();
    assert_eq!(updated["description"], "Core services");

    let members: Vec<Value> = app
        .server
        .get(&format!("/api/teams/{}/members", team_id))
        .authorization_bearer(&member.access_token)
        .await
        .json();
    assert_eq!(members.len(), 2);
}

#[tokio::test]
async fn test_owner_cannot_be_added_demoted_or_removed() {
    let app = TestApp::new();
    let owner = app.register().await;
    let admin = app.register().await;
    let team = app.create_team(&owner, "Core").await;
    let team_id = team["id"].as_str().unwrap();
    app.server
        .post(&format!("/api/teams/{}/members", team_id))
        .authorization_bearer(&owner.access_token)
        .json(&json!({ "user_id": admin.id, "role": "admin" }))
        .await
        .assert_status(StatusCode::CREATED);

    app.server
        .patch(&format!("/api/teams/{}/members/{}", team_id, owner.id))
        .authorization_bearer(&admin.access_token)
        .json(&json!({ "role": "member" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    app.server
        .delete(&format!("/api/teams/{}/members/{}", team_id, owner.id))
        .authorization_bearer(&owner.access_token)
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_member_can_leave() {
    let app = TestApp::new();
    let owner = app.register().await;
    let member = app.register().await;
    let team = app.create_team(&owner, "Core").await;
    let team_id = team["id"].as_str().unwrap();
    app.add_team_member(&owner, team_id, &member).await;

    app.server
        .delete(&format!("/api/teams/{}/members/{}", team_id, member.id))
        .authorization_bearer(&member.access_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .get(&format!("/api/teams/{}", team_id))
        .authorization_bearer(&member.access_token)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_team_hides_it_and_its_projects() {
    let app = TestApp::new();
    let owner = app.register().await;
    let team = app.create_team(&owner, "Doomed").await;
    let team_id = team["id"].as_str().unwrap();
    let project = app.create_project(&owner, team_id, "Inside").await;

    app.server
        .delete(&format!("/api/teams/{}", team_id))
        .authorization_bearer(&owner.access_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .get(&format!("/api/teams/{}", team_id))
        .authorization_bearer(&owner.access_token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .get(&format!("/api/projects/{}", project["id"].as_str().unwrap()))
        .authorization_bearer(&owner.access_token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_presence_without_connections_is_empty() {
    let app = TestApp::new();
    let owner = app.register().await;
    let team = app.create_team(&owner, "Core").await;

    let presence: Value = app
        .server
        .get(&format!("/api/teams/{}/presence", team["id"].as_str().unwrap()))
        .authorization_bearer(&owner.access_token)
        .await
        .json();

    assert_eq!(presence["team_id"], team["id"]);
    assert_eq!(presence["online"], json!([]));
}
