//! Notification API Tests
//!
//! Notifications are written by the job worker, so each test drains the
//! queue before reading the inbox.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{workspace, TestApp, TestUser, Workspace};

/// A second user who can be assigned work in the workspace project
async fn contributor(app: &TestApp, ws: &Workspace) -> TestUser {
    let user = app.register().await;
    app.add_team_member(&ws.owner, &ws.team_id, &user).await;
    app.server
        .post(&format!("/api/projects/{}/members", ws.project_id))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "user_id": user.id }))
        .await
        .assert_status(StatusCode::CREATED);
    user
}

async fn inbox(app: &TestApp, user: &TestUser) -> Value {
    app.server
        .get("/api/notifications")
        .authorization_bearer(&user.access_token)
        .await
        .json()
}

fn kinds(page: &Value) -> Vec<String> {
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["kind"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_assignment_notifies_assignee_not_actor() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let user = contributor(&app, &ws).await;

    let task = app
        .create_task(
            &ws.owner,
            &ws.project_id,
            json!({ "title": "Review PR", "assignee_ids": [user.id, ws.owner.id] }),
        )
        .await;

    // Nothing is visible until the worker runs
    assert_eq!(inbox(&app, &user).await["total"], 0);
    assert!(app.drain_jobs().await >= 2);

    let page = inbox(&app, &user).await;
    let kinds = kinds(&page);
    assert!(kinds.contains(&"task_assigned".to_string()));
    assert!(kinds.contains(&"team_member_added".to_string()));

    let assigned = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["kind"] == "task_assigned")
        .unwrap();
    assert_eq!(assigned["entity_id"], task["id"]);
    assert_eq!(assigned["actor_id"], ws.owner.id.as_str());
    assert_eq!(assigned["read"], false);

    assert_eq!(inbox(&app, &ws.owner).await["total"], 0);
}

#[tokio::test]
async fn test_draining_twice_does_not_duplicate() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let user = contributor(&app, &ws).await;
    app.drain_jobs().await;

    assert_eq!(app.drain_jobs().await, 0);
    assert_eq!(inbox(&app, &user).await["total"], 1);
}

#[tokio::test]
async fn test_status_change_and_mentions_notify() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let user = contributor(&app, &ws).await;
    let task = app
        .create_task(&user, &ws.project_id, json!({ "title": "Owned by contributor" }))
        .await;
    let task_id = task["id"].as_str().unwrap();

    app.server
        .patch(&format!("/api/tasks/{}", task_id))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "status": "in_review" }))
        .await
        .assert_status_ok();
    app.server
        .post(&format!("/api/tasks/{}/comments", task_id))
        .authorization_bearer(&user.access_token)
        .json(&json!({ "content": "Can you look?", "mentions": [ws.owner.id] }))
        .await
        .assert_status(StatusCode::CREATED);
    app.drain_jobs().await;

    assert!(kinds(&inbox(&app, &user).await).contains(&"task_status_changed".to_string()));
    assert!(kinds(&inbox(&app, &ws.owner).await).contains(&"mentioned".to_string()));
}

#[tokio::test]
async fn test_read_and_unread_counts() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let user = contributor(&app, &ws).await;
    app.create_task(
        &ws.owner,
        &ws.project_id,
        json!({ "title": "One", "assignee_ids": [user.id] }),
    )
    .await;
    app.create_task(
        &ws.owner,
        &ws.project_id,
        json!({ "title": "Two", "assignee_ids": [user.id] }),
    )
    .await;
    app.drain_jobs().await;

    let count: Value = app
        .server
        .get("/api/notifications/unread-count")
        .authorization_bearer(&user.access_token)
        .await
        .json();
    assert_eq!(count["unread"], 3);

    let first_id = inbox(&app, &user).await["items"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();
    let read: Value = app
        .server
        .patch(&format!("/api/notifications/{}/read", first_id))
        .authorization_bearer(&user.access_token)
        .await
        .json();
    assert_eq!(read["read"], true);
    assert!(read["read_at"].is_string());

    let unread: Value = app
        .server
        .get("/api/notifications")
        .add_query_param("unread_only", true)
        .authorization_bearer(&user.access_token)
        .await
        .json();
    assert_eq!(unread["total"], 2);

    let marked: Value = app
        .server
        .post("/api/notifications/read-all")
        .authorization_bearer(&user.access_token)
        .await
        .json();
    assert_eq!(marked["updated"], 2);

    let count: Value = app
        .server
        .get("/api/notifications/unread-count")
        .authorization_bearer(&user.access_token)
        .await
        .json();
    assert_eq!(count["unread"], 0);
}

#[tokio::test]
async fn test_notifications_are_private() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let user = contributor(&app, &ws).await;
    app.drain_jobs().await;

    let id = inbox(&app, &user).await["items"][0]["id"]
        .as_str()
        .unwrap()
        .to_string();

    app.server
        .patch(&format!("/api/notifications/{}/read", id))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
    app.server
        .delete(&format!("/api/notifications/{}", id))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.server
        .delete(&format!("/api/notifications/{}", id))
        .authorization_bearer(&user.access_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    assert_eq!(inbox(&app, &user).await["total"], 0);
}
