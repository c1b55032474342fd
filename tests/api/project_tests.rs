//! Project API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{workspace, TestApp};

#[tokio::test]
async fn test_create_project_makes_creator_manager() {
    let app = TestApp::new();
    let ws = workspace(&app).await;

    let project: Value = app
        .server
        .get(&format!("/api/projects/{}", ws.project_id))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .json();

    assert_eq!(project["name"], "Roadmap");
    assert_eq!(project["team_id"], ws.team_id.as_str());
    assert_eq!(project["status"], "active");
    assert_eq!(project["members"][0]["role"], "manager");
}

#[tokio::test]
async fn test_create_project_rejects_inverted_dates() {
    let app = TestApp::new();
    let ws = workspace(&app).await;

    let response = app
        .server
        .post("/api/projects")
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({
            "team_id": ws.team_id,
            "name": "Backwards",
            "start_date": "2026-05-01",
            "due_date": "2026-04-01"
        }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["errors"][0]["field"], "due_date");
}

#[tokio::test]
async fn test_list_projects_with_filters() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    app.create_project(&ws.owner, &ws.team_id, "Website refresh").await;

    let all: Value = app
        .server
        .get("/api/projects")
        .authorization_bearer(&ws.owner.access_token)
        .await
        .json();
    assert_eq!(all["total"], 2);

    let searched: Value = app
        .server
        .get("/api/projects")
        .add_query_param("team_id", &ws.team_id)
        .add_query_param("q", "website")
        .authorization_bearer(&ws.owner.access_token)
        .await
        .json();
    assert_eq!(searched["total"], 1);
    assert_eq!(searched["items"][0]["name"], "Website refresh");
}

#[tokio::test]
async fn test_outsider_cannot_see_project() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let outsider = app.register().await;

    app.server
        .get(&format!("/api/projects/{}", ws.project_id))
        .authorization_bearer(&outsider.access_token)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let listed: Value = app
        .server
        .get("/api/projects")
        .authorization_bearer(&outsider.access_token)
        .await
        .json();
    assert_eq!(listed["total"], 0);
}

#[tokio::test]
async fn test_project_member_must_belong_to_team() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let stranger = app.register().await;

    let response = app
        .server
        .post(&format!("/api/projects/{}/members", ws.project_id))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "user_id": stranger.id }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["errors"][0]["field"], "user_id");

    app.add_team_member(&ws.owner, &ws.team_id, &stranger).await;
    let member: Value = app
        .server
        .post(&format!("/api/projects/{}/members", ws.project_id))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "user_id": stranger.id, "role": "viewer" }))
        .await
        .json();
    assert_eq!(member["role"], "viewer");
}

#[tokio::test]
async fn test_viewer_cannot_create_tasks_but_contributor_can() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let user = app.register().await;
    app.add_team_member(&ws.owner, &ws.team_id, &user).await;
    app.server
        .post(&format!("/api/projects/{}/members", ws.project_id))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "user_id": user.id, "role": "viewer" }))
        .await
        .assert_status(StatusCode::CREATED);

    app.server
        .post(&format!("/api/projects/{}/tasks", ws.project_id))
        .authorization_bearer(&user.access_token)
        .json(&json!({ "title": "Not allowed" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    app.server
        .patch(&format!("/api/projects/{}/members/{}", ws.project_id, user.id))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "role": "contributor" }))
        .await
        .assert_status_ok();

    app.create_task(&user, &ws.project_id, json!({ "title": "Allowed now" }))
        .await;
}

#[tokio::test]
async fn test_plain_team_member_needs_project_role() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let member = app.register().await;
    app.add_team_member(&ws.owner, &ws.team_id, &member).await;

    app.server
        .get(&format!("/api/projects/{}", ws.project_id))
        .authorization_bearer(&member.access_token)
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_member_can_leave_project() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let user = app.register().await;
    app.add_team_member(&ws.owner, &ws.team_id, &user).await;
    app.server
        .post(&format!("/api/projects/{}/members", ws.project_id))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "user_id": user.id }))
        .await
        .assert_status(StatusCode::CREATED);

    app.server
        .delete(&format!("/api/projects/{}/members/{}", ws.project_id, user.id))
        .authorization_bearer(&user.access_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let members: Vec<Value> = app
        .server
        .get(&format!("/api/projects/{}/members", ws.project_id))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .json();
    assert_eq!(members.len(), 1);
}

#[tokio::test]
async fn test_project_stats() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let owner = &ws.owner;
    app.create_task(owner, &ws.project_id, json!({ "title": "One" })).await;
    app.create_task(owner, &ws.project_id, json!({ "title": "Two", "status": "in_progress" }))
        .await;
    app.create_task(owner, &ws.project_id, json!({ "title": "Three", "status": "done" }))
        .await;
    app.create_task(
        owner,
        &ws.project_id,
        json!({ "title": "Late", "due_date": "2020-01-01T00:00:00Z" }),
    )
    .await;

    let stats: Value = app
        .server
        .get(&format!("/api/projects/{}/stats", ws.project_id))
        .authorization_bearer(&owner.access_token)
        .await
        .json();

    assert_eq!(stats["project_id"], ws.project_id.as_str());
    assert_eq!(stats["total"], 4);
    assert_eq!(stats["todo"], 2);
    assert_eq!(stats["in_progress"], 1);
    assert_eq!(stats["done"], 1);
    assert_eq!(stats["overdue"], 1);
}

#[tokio::test]
async fn test_delete_project_hides_tasks() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let task = app
        .create_task(&ws.owner, &ws.project_id, json!({ "title": "Orphan" }))
        .await;

    app.server
        .delete(&format!("/api/projects/{}", ws.project_id))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .get(&format!("/api/tasks/{}", task["id"].as_str().unwrap()))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
