//! Attachment API Tests

use axum::http::{header, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{workspace, TestApp, Workspace};

fn file_form(name: &str, mime: &str, content: &[u8]) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(content.to_vec())
            .file_name(name)
            .mime_type(mime),
    )
}

async fn task_path(app: &TestApp, ws: &Workspace) -> String {
    let task = app
        .create_task(&ws.owner, &ws.project_id, json!({ "title": "With files" }))
        .await;
    format!("/api/tasks/{}/attachments", task["id"].as_str().unwrap())
}

#[tokio::test]
async fn test_upload_list_and_download() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let path = task_path(&app, &ws).await;

    let response = app
        .server
        .post(&path)
        .authorization_bearer(&ws.owner.access_token)
        .multipart(file_form("notes.txt", "text/plain", b"meeting notes"))
        .await;
    response.assert_status(StatusCode::CREATED);
    let attachment: Value = response.json();
    assert_eq!(attachment["filename"], "notes.txt");
    assert_eq!(attachment["content_type"], "text/plain");
    assert_eq!(attachment["size"], 13);
    assert_eq!(attachment["uploaded_by"], ws.owner.id.as_str());
    let url = attachment["url"].as_str().unwrap().to_string();

    let listed: Vec<Value> = app
        .server
        .get(&path)
        .authorization_bearer(&ws.owner.access_token)
        .await
        .json();
    assert_eq!(listed.len(), 1);

    let download = app
        .server
        .get(&url)
        .authorization_bearer(&ws.owner.access_token)
        .await;
    download.assert_status_ok();
    assert_eq!(download.header(header::CONTENT_TYPE), "text/plain");
    assert_eq!(
        download.header(header::CONTENT_DISPOSITION),
        "attachment; filename=\"notes.txt\""
    );
    assert_eq!(download.as_bytes().as_ref(), b"meeting notes");
}

#[tokio::test]
async fn test_path_components_are_stripped_from_filename() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let path = task_path(&app, &ws).await;

    let attachment: Value = app
        .server
        .post(&path)
        .authorization_bearer(&ws.owner.access_token)
        .multipart(file_form("../../etc/passwd.txt", "text/plain", b"x"))
        .await
        .json();

    assert_eq!(attachment["filename"], "passwd.txt");
}

#[tokio::test]
async fn test_rejects_disallowed_type_and_missing_file() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let path = task_path(&app, &ws).await;

    let response = app
        .server
        .post(&path)
        .authorization_bearer(&ws.owner.access_token)
        .multipart(file_form("run.exe", "application/x-msdownload", b"MZ"))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.json::<Value>()["errors"][0]["field"], "file");

    let form = MultipartForm::new().add_text("comment", "no file here");
    app.server
        .post(&path)
        .authorization_bearer(&ws.owner.access_token)
        .multipart(form)
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_rejects_oversized_file() {
    let app = TestApp::with_settings(|settings| settings.uploads.max_file_size = 16);
    let ws = workspace(&app).await;
    let path = task_path(&app, &ws).await;

    app.server
        .post(&path)
        .authorization_bearer(&ws.owner.access_token)
        .multipart(file_form("big.txt", "text/plain", &[b'a'; 64]))
        .await
        .assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_delete_attachment() {
    let app = TestApp::new();
    let ws = workspace(&app).await;
    let path = task_path(&app, &ws).await;
    let attachment: Value = app
        .server
        .post(&path)
        .authorization_bearer(&ws.owner.access_token)
        .multipart(file_form("photo.png", "image/png", b"\x89PNG"))
        .await
        .json();
    let url = attachment["url"].as_str().unwrap().to_string();

    app.server
        .delete(&url)
        .authorization_bearer(&ws.owner.access_token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .get(&url)
        .authorization_bearer(&ws.owner.access_token)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
