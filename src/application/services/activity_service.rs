//! Activity Service
//!
//! Writes the append-only activity log and serves the per-project and
//! per-task feeds.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use super::access::{self, AccessError, ProjectScope, TaskScope};
use crate::domain::services::AccessLevel;
use crate::domain::{Activity, ActivityAction, ActivityRepository, EntityType, Repositories};
use crate::shared::pagination::{Page, PageRequest};
use crate::shared::snowflake::SnowflakeGenerator;

/// An activity entry before it gets an id and timestamp.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub actor_id: i64,
    pub team_id: Option<i64>,
    pub project_id: Option<i64>,
    pub task_id: Option<i64>,
    pub entity_type: EntityType,
    pub entity_id: i64,
    pub action: ActivityAction,
    pub metadata: Value,
}

impl NewActivity {
    pub fn new(actor_id: i64, entity_type: EntityType, entity_id: i64, action: ActivityAction) -> Self {
        Self {
            actor_id,
            team_id: None,
            project_id: None,
            task_id: None,
            entity_type,
            entity_id,
            action,
            metadata: Value::Object(Default::default()),
        }
    }

    pub fn in_team(mut self, team_id: i64) -> Self {
        self.team_id = Some(team_id);
        self
    }

    pub fn in_project(mut self, scope: &ProjectScope) -> Self {
        self.team_id = Some(scope.team.id);
        self.project_id = Some(scope.project.id);
        self
    }

    pub fn in_task(self, scope: &TaskScope) -> Self {
        let mut activity = self.in_project(&scope.scope);
        activity.task_id = Some(scope.task.id);
        activity
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Appends activity entries on behalf of other services.
///
/// Failures are logged and swallowed: the primary write already happened.
#[derive(Clone)]
pub struct ActivityRecorder {
    repo: Arc<dyn ActivityRepository>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl ActivityRecorder {
    pub fn new(repo: Arc<dyn ActivityRepository>, id_generator: Arc<SnowflakeGenerator>) -> Self {
        Self { repo, id_generator }
    }

    pub async fn record(&self, entry: NewActivity) {
        let activity = Activity {
            id: self.id_generator.generate(),
            actor_id: entry.actor_id,
            team_id: entry.team_id,
            project_id: entry.project_id,
            task_id: entry.task_id,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            action: entry.action,
            metadata: entry.metadata,
            created_at: Utc::now(),
        };

        if let Err(e) = self.repo.append(&activity).await {
            tracing::warn!(
                entity_type = %activity.entity_type,
                entity_id = activity.entity_id,
                action = %activity.action,
                error = %e,
                "Failed to record activity"
            );
        }
    }
}

/// Activity feed queries
#[async_trait]
pub trait ActivityService: Send + Sync {
    async fn list_for_project(
        &self,
        user_id: i64,
        project_id: i64,
        page: PageRequest,
    ) -> Result<Page<Activity>, AccessError>;

    async fn list_for_task(
        &self,
        user_id: i64,
        task_id: i64,
        page: PageRequest,
    ) -> Result<Page<Activity>, AccessError>;
}

pub struct ActivityServiceImpl {
    repos: Repositories,
}

impl ActivityServiceImpl {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }
}

#[async_trait]
impl ActivityService for ActivityServiceImpl {
    async fn list_for_project(
        &self,
        user_id: i64,
        project_id: i64,
        page: PageRequest,
    ) -> Result<Page<Activity>, AccessError> {
        access::project_scope(&self.repos, project_id, user_id, AccessLevel::Viewer).await?;
        Ok(self.repos.activities.list_for_project(project_id, page).await?)
    }

    async fn list_for_task(
        &self,
        user_id: i64,
        task_id: i64,
        page: PageRequest,
    ) -> Result<Page<Activity>, AccessError> {
        access::task_scope(&self.repos, task_id, user_id, AccessLevel::Viewer).await?;
        Ok(self.repos.activities.list_for_task(task_id, page).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Project, Team};
    use crate::infrastructure::repositories::memory;

    async fn seed(repos: &Repositories) -> (Team, Project) {
        let team = repos.teams.create(&Team::new(1, "Core".into(), None, 10)).await.unwrap();
        let project = repos
            .projects
            .create(&Project::new(2, team.id, "Roadmap".into(), 10))
            .await
            .unwrap();
        (team, project)
    }

    #[tokio::test]
    async fn test_recorder_appends_and_feed_is_newest_first() {
        let repos = memory::repositories();
        let (team, project) = seed(&repos).await;
        let recorder = ActivityRecorder::new(
            repos.activities.clone(),
            Arc::new(SnowflakeGenerator::default()),
        );

        for action in [ActivityAction::Created, ActivityAction::Updated] {
            let mut entry = NewActivity::new(10, EntityType::Project, project.id, action)
                .in_team(team.id)
                .with_metadata(serde_json::json!({"name": "Roadmap"}));
            entry.project_id = Some(project.id);
            recorder.record(entry).await;
        }

        let service = ActivityServiceImpl::new(repos);
        let page = service
            .list_for_project(10, project.id, PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items[0].action, ActivityAction::Updated);
        assert_eq!(page.items[1].metadata["name"], "Roadmap");
    }

    #[tokio::test]
    async fn test_feed_requires_project_access() {
        let repos = memory::repositories();
        let (_, project) = seed(&repos).await;
        let service = ActivityServiceImpl::new(repos);

        let result = service.list_for_project(99, project.id, PageRequest::default()).await;
        assert!(matches!(result, Err(AccessError::Forbidden(_))));

        let result = service.list_for_task(10, 12345, PageRequest::default()).await;
        assert!(matches!(result, Err(AccessError::NotFound("Task"))));
    }
}
