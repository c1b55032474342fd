//! Common Test Utilities
//!
//! Shared helpers, fixtures, and test infrastructure.

use axum_test::TestServer;
use fake::faker::internet::en::{SafeEmail, Username};
use fake::Fake;
use serde_json::{json, Value};
use tempfile::TempDir;

use task_server::config::Settings;
use task_server::startup::{build_router, AppState};

pub const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const PASSWORD: &str = "TestPassword123!";

/// Test application over in-memory repositories and queue
pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    _uploads: TempDir,
}

/// A registered user with a live access token
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(|_| {})
    }

    /// Build with adjusted settings
    pub fn with_settings(configure: impl FnOnce(&mut Settings)) -> Self {
        let uploads = tempfile::tempdir().expect("temp dir");
        let mut settings = Settings::for_tests(JWT_SECRET).expect("test settings");
        settings.uploads.storage_dir = uploads.path().to_string_lossy().into_owned();
        configure(&mut settings);

        let state = AppState::in_memory(settings);
        let server = TestServer::new(build_router(state.clone())).expect("test server");

        Self {
            server,
            state,
            _uploads: uploads,
        }
    }

    /// Server over a real socket, needed for WebSocket upgrades
    pub fn socket_server(&self) -> TestServer {
        TestServer::builder()
            .http_transport()
            .build(build_router(self.state.clone()))
            .expect("socket server")
    }

    /// Register a fresh user with generated credentials
    pub async fn register(&self) -> TestUser {
        let base: String = Username().fake();
        let base: String = base
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(16)
            .collect();
        let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
        let username = format!("{}_{}", base, suffix);
        let email = format!("{}_{}", suffix, SafeEmail().fake::<String>());

        let response = self
            .server
            .post("/api/auth/register")
            .json(&json!({
                "username": username,
                "email": email,
                "password": PASSWORD,
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: Value = response.json();
        TestUser {
            id: body["user"]["id"].as_str().expect("user id").to_string(),
            username,
            email,
            access_token: body["access_token"].as_str().expect("token").to_string(),
            refresh_token: body["refresh_token"].as_str().expect("refresh").to_string(),
        }
    }

    /// Create a team owned by `owner` and return its JSON
    pub async fn create_team(&self, owner: &TestUser, name: &str) -> Value {
        let response = self
            .server
            .post("/api/teams")
            .authorization_bearer(&owner.access_token)
            .json(&json!({ "name": name }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json()
    }

    /// Add `user` to a team as a plain member
    pub async fn add_team_member(&self, owner: &TestUser, team_id: &str, user: &TestUser) {
        self.server
            .post(&format!("/api/teams/{}/members", team_id))
            .authorization_bearer(&owner.access_token)
            .json(&json!({ "user_id": user.id }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);
    }

    /// Create a project in `team_id`; the creator becomes manager
    pub async fn create_project(&self, user: &TestUser, team_id: &str, name: &str) -> Value {
        let response = self
            .server
            .post("/api/projects")
            .authorization_bearer(&user.access_token)
            .json(&json!({ "team_id": team_id, "name": name }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json()
    }

    /// Create a task with extra fields merged into the body
    pub async fn create_task(&self, user: &TestUser, project_id: &str, body: Value) -> Value {
        let response = self
            .server
            .post(&format!("/api/projects/{}/tasks", project_id))
            .authorization_bearer(&user.access_token)
            .json(&body)
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json()
    }

    /// Run queued jobs until the queue is empty
    pub async fn drain_jobs(&self) -> usize {
        let worker = self.state.worker();
        let mut processed = 0;
        while worker.process_next().await.expect("process job") {
            processed += 1;
        }
        processed
    }
}

/// Owner with a team and a project, the common starting point
pub struct Workspace {
    pub owner: TestUser,
    pub team_id: String,
    pub project_id: String,
}

pub async fn workspace(app: &TestApp) -> Workspace {
    let owner = app.register().await;
    let team = app.create_team(&owner, "Platform").await;
    let team_id = team["id"].as_str().expect("team id").to_string();
    let project = app.create_project(&owner, &team_id, "Roadmap").await;

    Workspace {
        owner,
        team_id,
        project_id: project["id"].as_str().expect("project id").to_string(),
    }
}
