//! Subtask Service
//!
//! Checklist items of a task.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::access::{self, AccessError, TaskScope};
use super::activity_service::{ActivityRecorder, NewActivity};
use crate::application::dto::request::{CreateSubtaskRequest, UpdateSubtaskRequest};
use crate::application::realtime::{DeletedRef, EventBroadcaster, RealtimeEvent};
use crate::domain::services::AccessLevel;
use crate::domain::{ActivityAction, EntityType, Repositories, Subtask};
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::required_text;

#[async_trait]
pub trait SubtaskService: Send + Sync {
    async fn list(&self, user_id: i64, task_id: i64) -> Result<Vec<Subtask>, AccessError>;

    async fn create(
        &self,
        user_id: i64,
        task_id: i64,
        request: CreateSubtaskRequest,
    ) -> Result<Subtask, AccessError>;

    async fn update(
        &self,
        user_id: i64,
        subtask_id: i64,
        request: UpdateSubtaskRequest,
    ) -> Result<Subtask, AccessError>;

    async fn delete(&self, user_id: i64, subtask_id: i64) -> Result<(), AccessError>;
}

pub struct SubtaskServiceImpl {
    repos: Repositories,
    id_generator: Arc<SnowflakeGenerator>,
    events: Arc<dyn EventBroadcaster>,
    activity: ActivityRecorder,
}

impl SubtaskServiceImpl {
    pub fn new(
        repos: Repositories,
        id_generator: Arc<SnowflakeGenerator>,
        events: Arc<dyn EventBroadcaster>,
        activity: ActivityRecorder,
    ) -> Self {
        Self {
            repos,
            id_generator,
            events,
            activity,
        }
    }

    /// Load a live subtask and the scope of its task.
    async fn load(
        &self,
        user_id: i64,
        subtask_id: i64,
        required: AccessLevel,
    ) -> Result<(Subtask, TaskScope), AccessError> {
        let subtask = self
            .repos
            .subtasks
            .find_by_id(subtask_id)
            .await?
            .ok_or(AccessError::NotFound("Subtask"))?;
        let scope = access::task_scope(&self.repos, subtask.task_id, user_id, required)
            .await
            .map_err(|e| match e {
                AccessError::NotFound(_) => AccessError::NotFound("Subtask"),
                other => other,
            })?;
        Ok((subtask, scope))
    }

    async fn record(&self, user_id: i64, scope: &TaskScope, subtask: &Subtask, action: ActivityAction) {
        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Subtask, subtask.id, action)
                    .in_task(scope)
                    .with_metadata(json!({ "title": subtask.title })),
            )
            .await;
    }
}

#[async_trait]
impl SubtaskService for SubtaskServiceImpl {
    async fn list(&self, user_id: i64, task_id: i64) -> Result<Vec<Subtask>, AccessError> {
        access::task_scope(&self.repos, task_id, user_id, AccessLevel::Viewer).await?;
        Ok(self.repos.subtasks.list_for_task(task_id).await?)
    }

    async fn create(
        &self,
        user_id: i64,
        task_id: i64,
        request: CreateSubtaskRequest,
    ) -> Result<Subtask, AccessError> {
        let scope = access::task_scope(&self.repos, task_id, user_id, AccessLevel::Contributor).await?;

        let position = match request.position {
            Some(position) => position,
            None => self
                .repos
                .subtasks
                .list_for_task(task_id)
                .await?
                .iter()
                .map(|s| s.position.saturating_add(1))
                .max()
                .unwrap_or(0),
        };
        let subtask = Subtask::new(
            self.id_generator.generate(),
            task_id,
            required_text(&request.title, "title")?,
            position,
            user_id,
        );
        let subtask = self.repos.subtasks.create(&subtask).await?;

        self.record(user_id, &scope, &subtask, ActivityAction::Created).await;
        self.events
            .publish(&scope.rooms(), RealtimeEvent::SubtaskCreated(subtask.clone().into()));
        Ok(subtask)
    }

    async fn update(
        &self,
        user_id: i64,
        subtask_id: i64,
        request: UpdateSubtaskRequest,
    ) -> Result<Subtask, AccessError> {
        let (mut subtask, scope) = self.load(user_id, subtask_id, AccessLevel::Contributor).await?;
        let now = Utc::now();
        let was_completed = subtask.is_completed;

        if let Some(title) = request.title {
            subtask.title = required_text(&title, "title")?;
        }
        if let Some(completed) = request.is_completed {
            subtask.set_completed(completed, now);
        }
        if let Some(position) = request.position {
            subtask.position = position;
        }
        subtask.updated_at = now;
        let subtask = self.repos.subtasks.update(&subtask).await?;

        let action = if subtask.is_completed && !was_completed {
            ActivityAction::Completed
        } else {
            ActivityAction::Updated
        };
        self.record(user_id, &scope, &subtask, action).await;
        self.events
            .publish(&scope.rooms(), RealtimeEvent::SubtaskUpdated(subtask.clone().into()));
        Ok(subtask)
    }

    async fn delete(&self, user_id: i64, subtask_id: i64) -> Result<(), AccessError> {
        let (subtask, scope) = self.load(user_id, subtask_id, AccessLevel::Contributor).await?;
        self.repos.subtasks.soft_delete(subtask_id, Utc::now()).await?;

        self.record(user_id, &scope, &subtask, ActivityAction::Deleted).await;
        self.events.publish(
            &scope.rooms(),
            RealtimeEvent::SubtaskDeleted(DeletedRef::new(subtask_id, Some(subtask.task_id))),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::realtime::{MockEventBroadcaster, Room};
    use crate::domain::{Project, ProjectMember, ProjectRole, Task, Team, TeamMember, TeamRole};
    use crate::infrastructure::repositories::memory;

    async fn fixture(events: MockEventBroadcaster) -> (SubtaskServiceImpl, Task) {
        let repos = memory::repositories();
        repos.teams.create(&Team::new(1, "Core".into(), None, 1)).await.unwrap();
        repos.teams.add_member(1, &TeamMember::new(2, TeamRole::Member)).await.unwrap();
        repos.projects.create(&Project::new(10, 1, "Roadmap".into(), 1)).await.unwrap();
        repos
            .projects
            .add_member(10, &ProjectMember::new(2, ProjectRole::Viewer))
            .await
            .unwrap();
        let task = repos.tasks.create(&Task::new(20, 10, "Task".into(), 1)).await.unwrap();

        let ids = Arc::new(SnowflakeGenerator::default());
        let service = SubtaskServiceImpl::new(
            repos.clone(),
            ids.clone(),
            Arc::new(events),
            ActivityRecorder::new(repos.activities.clone(), ids),
        );
        (service, task)
    }

    fn create_request(title: &str) -> CreateSubtaskRequest {
        CreateSubtaskRequest {
            title: title.into(),
            position: None,
        }
    }

    #[tokio::test]
    async fn test_create_complete_delete() {
        let mut events = MockEventBroadcaster::new();
        events
            .expect_publish()
            .withf(|rooms, _| rooms.contains(&Room::Task(20)))
            .times(4)
            .return_const(());
        let (service, task) = fixture(events).await;

        let first = service.create(1, task.id, create_request("One")).await.unwrap();
        let second = service.create(1, task.id, create_request("Two")).await.unwrap();
        assert_eq!((first.position, second.position), (0, 1));

        let done = service
            .update(
                1,
                first.id,
                UpdateSubtaskRequest {
                    title: None,
                    is_completed: Some(true),
                    position: None,
                },
            )
            .await
            .unwrap();
        assert!(done.is_completed);
        assert!(done.completed_at.is_some());

        service.delete(1, second.id).await.unwrap();
        let remaining = service.list(2, task.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(matches!(
            service.delete(1, second.id).await,
            Err(AccessError::NotFound("Subtask"))
        ));
    }

    #[tokio::test]
    async fn test_viewer_cannot_write() {
        let (service, task) = fixture(MockEventBroadcaster::new()).await;
        let result = service.create(2, task.id, create_request("Nope")).await;
        assert!(matches!(result, Err(AccessError::Forbidden(_))));
    }
}
