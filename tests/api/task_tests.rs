//! Task, Subtask, Comment and Activity API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{workspace, TestApp};

fn titles(page: &Value) -> Vec<String> {
    page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_create_task_defaults() {
    let app = TestApp::new();
    let ws = workspace(&app).await;

    let task = app
        .create_task(
            &ws.owner,
            &ws.project_id,
            json!({ "title": "  Write docs ", "tags": ["Docs", "docs ", "backend"] }),
        )
        .await;

    assert_eq!(task["title"], "Write docs");
    assert_eq!(task["status"], "todo");
    assert_eq!(task["priority"], "medium");
    assert_eq!(task["reporter_id"], ws.owner.id.as_str());
    assert_eq!(task["tags"], json!(["docs", "backend"]));
    assert_eq!(task["position"], 0);
    assert!(task["completed_at"].is_null());

    let next = app
        .create_task(&ws.owner, &ws.project_id, json!({ "title": "Second" }))
        .await;
    assert_eq!(next["position"], 1);
}

#[tokio::test]
async fn test_create_task_validation() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let path = format!("/api/projects/{}/tasks", ws.project_id);

    app.server
        .post(&path)
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "title": "" }))
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    app.server
        .post(&path)
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "title": "Bad status", "status": "finished" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // Assignees must be able to see the project
    let outsider = app.register().await;
    let response = app
        .server
        .post(&path)
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "title": "Assign", "assignee_ids": [outsider.id] }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["errors"][0]["field"], "assignee_ids");
}

#[tokio::test]
async fn test_status_change_tracks_completion() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let task = app
        .create_task(&ws.owner, &ws.project_id, json!({ "title": "Ship it" }))
        .await;
    let path = format!("/api/tasks/{}", task["id"].as_str().unwrap());

    let done: Value = app
        .server
        .patch(&path)
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "status": "done" }))
        .await
        .json();
    assert_eq!(done["status"], "done");
    assert!(done["completed_at"].is_string());
    assert_eq!(done["title"], "Ship it");

    let reopened: Value = app
        .server
        .patch(&path)
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "status": "in_review" }))
        .await
        .json();
    assert!(reopened["completed_at"].is_null());
}

#[tokio::test]
async fn test_patch_can_clear_nullable_fields() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let task = app
        .create_task(
            &ws.owner,
            &ws.project_id,
            json!({ "title": "Dated", "description": "Details", "due_date": "2030-01-01T00:00:00Z" }),
        )
        .await;

    let updated: Value = app
        .server
        .patch(&format!("/api/tasks/{}", task["id"].as_str().unwrap()))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "description": null, "due_date": null }))
        .await
        .json();

    assert!(updated["description"].is_null());
    assert!(updated["due_date"].is_null());
}

#[tokio::test]
async fn test_list_filters_and_sorting() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let owner = &ws.owner;
    let member = app.register().await;
    app.add_team_member(owner, &ws.team_id, &member).await;
    app.server
        .post(&format!("/api/projects/{}/members", ws.project_id))
        .authorization_bearer(&owner.access_token)
        .json(&json!({ "user_id": member.id }))
        .await
        .assert_status(StatusCode::CREATED);

    app.create_task(
        owner,
        &ws.project_id,
        json!({ "title": "Fix login bug", "priority": "urgent", "tags": ["bug"], "assignee_ids": [member.id] }),
    )
    .await;
    app.create_task(
        owner,
        &ws.project_id,
        json!({ "title": "Polish UI", "priority": "low", "status": "in_progress", "due_date": "2030-03-01T00:00:00Z" }),
    )
    .await;
    app.create_task(
        owner,
        &ws.project_id,
        json!({ "title": "Write tests", "priority": "high", "tags": ["bug", "qa"], "due_date": "2030-01-01T00:00:00Z" }),
    )
    .await;
    let path = format!("/api/projects/{}/tasks", ws.project_id);

    let by_priority: Value = app
        .server
        .get(&path)
        .add_query_param("sort", "priority")
        .add_query_param("order", "desc")
        .authorization_bearer(&owner.access_token)
        .await
        .json();
    assert_eq!(
        titles(&by_priority),
        vec!["Fix login bug", "Write tests", "Polish UI"]
    );

    let by_due: Value = app
        .server
        .get(&path)
        .add_query_param("sort", "due_date")
        .add_query_param("order", "asc")
        .authorization_bearer(&owner.access_token)
        .await
        .json();
    assert_eq!(titles(&by_due), vec!["Write tests", "Polish UI", "Fix login bug"]);

    let tagged: Value = app
        .server
        .get(&path)
        .add_query_param("tag", "BUG")
        .authorization_bearer(&owner.access_token)
        .await
        .json();
    assert_eq!(tagged["total"], 2);

    let assigned: Value = app
        .server
        .get(&path)
        .add_query_param("assignee_id", &member.id)
        .authorization_bearer(&owner.access_token)
        .await
        .json();
    assert_eq!(titles(&assigned), vec!["Fix login bug"]);

    let in_progress: Value = app
        .server
        .get(&path)
        .add_query_param("status", "in_progress")
        .authorization_bearer(&owner.access_token)
        .await
        .json();
    assert_eq!(titles(&in_progress), vec!["Polish UI"]);

    let searched: Value = app
        .server
        .get(&path)
        .add_query_param("q", "TESTS")
        .authorization_bearer(&owner.access_token)
        .await
        .json();
    assert_eq!(titles(&searched), vec!["Write tests"]);

    let due_window: Value = app
        .server
        .get(&path)
        .add_query_param("due_after", "2030-01-01T00:00:00Z")
        .add_query_param("due_before", "2030-02-01T00:00:00Z")
        .authorization_bearer(&owner.access_token)
        .await
        .json();
    assert_eq!(titles(&due_window), vec!["Write tests"]);

    app.server
        .get(&path)
        .add_query_param("due_after", "2030-02-01T00:00:00Z")
        .add_query_param("due_before", "2030-01-01T00:00:00Z")
        .authorization_bearer(&owner.access_token)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pagination() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    for i in 0..5 {
        app.create_task(&ws.owner, &ws.project_id, json!({ "title": format!("Task {}", i) }))
            .await;
    }

    let page: Value = app
        .server
        .get(&format!("/api/projects/{}/tasks", ws.project_id))
        .add_query_param("page", 2)
        .add_query_param("limit", 2)
        .authorization_bearer(&ws.owner.access_token)
        .await
        .json();

    assert_eq!(page["page"], 2);
    assert_eq!(page["limit"], 2);
    assert_eq!(page["total"], 5);
    assert_eq!(page["total_pages"], 3);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_delete_and_restore() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let task = app
        .create_task(&ws.owner, &ws.project_id, json!({ "title": "Temporary" }))
        .await;
    let task_id = task["id"].as_str().unwrap();

    app.server
        .delete(&format!("/api/tasks/{}", task_id))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .get(&format!("/api/tasks/{}", task_id))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let restored: Value = app
        .server
        .post(&format!("/api/tasks/{}/restore", task_id))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .json();
    assert_eq!(restored["id"], task_id);

    app.server
        .get(&format!("/api/tasks/{}", task_id))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_contributor_cannot_delete_others_task() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let contributor = app.register().await;
    app.add_team_member(&ws.owner, &ws.team_id, &contributor).await;
    app.server
        .post(&format!("/api/projects/{}/members", ws.project_id))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "user_id": contributor.id }))
        .await
        .assert_status(StatusCode::CREATED);

    let task = app
        .create_task(&ws.owner, &ws.project_id, json!({ "title": "Owner's" }))
        .await;
    app.server
        .delete(&format!("/api/tasks/{}", task["id"].as_str().unwrap()))
        .authorization_bearer(&contributor.access_token)
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let own = app
        .create_task(&contributor, &ws.project_id, json!({ "title": "Mine" }))
        .await;
    app.server
        .delete(&format!("/api/tasks/{}", own["id"].as_str().unwrap()))
        .authorization_bearer(&contributor.access_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_subtasks() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let task = app
        .create_task(&ws.owner, &ws.project_id, json!({ "title": "Parent" }))
        .await;
    let path = format!("/api/tasks/{}/subtasks", task["id"].as_str().unwrap());

    let response = app
        .server
        .post(&path)
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "title": "Step one" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let subtask: Value = response.json();
    assert_eq!(subtask["is_completed"], false);

    let completed: Value = app
        .server
        .patch(&format!("/api/subtasks/{}", subtask["id"].as_str().unwrap()))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "is_completed": true }))
        .await
        .json();
    assert_eq!(completed["is_completed"], true);
    assert!(completed["completed_at"].is_string());

    let listed: Vec<Value> = app
        .server
        .get(&path)
        .authorization_bearer(&ws.owner.access_token)
        .await
        .json();
    assert_eq!(listed.len(), 1);

    app.server
        .delete(&format!("/api/subtasks/{}", subtask["id"].as_str().unwrap()))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    let listed: Vec<Value> = app
        .server
        .get(&path)
        .authorization_bearer(&ws.owner.access_token)
        .await
        .json();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn test_comments() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let task = app
        .create_task(&ws.owner, &ws.project_id, json!({ "title": "Discuss" }))
        .await;
    let path = format!("/api/tasks/{}/comments", task["id"].as_str().unwrap());

    let response = app
        .server
        .post(&path)
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "content": "First thoughts" }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let comment: Value = response.json();
    assert_eq!(comment["author_id"], ws.owner.id.as_str());
    assert!(comment["edited_at"].is_null());

    let edited: Value = app
        .server
        .patch(&format!("/api/comments/{}", comment["id"].as_str().unwrap()))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "content": "Second thoughts" }))
        .await
        .json();
    assert_eq!(edited["content"], "Second thoughts");
    assert!(edited["edited_at"].is_string());

    let page: Value = app
        .server
        .get(&path)
        .authorization_bearer(&ws.owner.access_token)
        .await
        .json();
    assert_eq!(page["total"], 1);

    app.server
        .delete(&format!("/api/comments/{}", comment["id"].as_str().unwrap()))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_only_author_edits_comment() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let other = app.register().await;
    app.add_team_member(&ws.owner, &ws.team_id, &other).await;
    app.server
        .post(&format!("/api/projects/{}/members", ws.project_id))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "user_id": other.id }))
        .await
        .assert_status(StatusCode::CREATED);
    let task = app
        .create_task(&ws.owner, &ws.project_id, json!({ "title": "Discuss" }))
        .await;

    let comment: Value = app
        .server
        .post(&format!("/api/tasks/{}/comments", task["id"].as_str().unwrap()))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "content": "Mine" }))
        .await
        .json();

    app.server
        .patch(&format!("/api/comments/{}", comment["id"].as_str().unwrap()))
        .authorization_bearer(&other.access_token)
        .json(&json!({ "content": "Not yours" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_activity_feed_records_changes() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let task = app
        .create_task(&ws.owner, &ws.project_id, json!({ "title": "Tracked" }))
        .await;
    let task_id = task["id"].as_str().unwrap();
    app.server
        .patch(&format!("/api/tasks/{}", task_id))
        .authorization_bearer(&ws.owner.access_token)
        .json(&json!({ "status": "in_progress" }))
        .await
        .assert_status_ok();

    let feed: Value = app
        .server
        .get(&format!("/api/tasks/{}/activity", task_id))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .json();
    let actions: Vec<&str> = feed["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["action"].as_str().unwrap())
        .collect();
    assert!(actions.contains(&"created"));
    assert!(actions.contains(&"status_changed"));

    let project_feed: Value = app
        .server
        .get(&format!("/api/projects/{}/activity", ws.project_id))
        .authorization_bearer(&ws.owner.access_token)
        .await
        .json();
    assert!(project_feed["total"].as_i64().unwrap() >= 2);
}

#[tokio::test]
async fn test_invalid_task_id_is_400() {
    let app = TestApp::new();
    let ws = workspace(&app).await;

    app.server
        .get("/api/tasks/abc")
        .authorization_bearer(&ws.owner.access_token)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
