//! Scope loading shared by the services: fetch a resource and its parents,
//! then decide access with [`AccessPolicy`].

use crate::application::realtime::Room;
use crate::domain::services::{AccessLevel, AccessPolicy};
use crate::domain::{Project, Repositories, Task, Team};
use crate::shared::error::AppError;

/// Failure to reach a resource.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<AccessError> for AppError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            AccessError::Forbidden(msg) => AppError::Forbidden(msg.into()),
            AccessError::Repository(e) => e,
        }
    }
}

/// A project together with its team and the caller's access level.
#[derive(Debug, Clone)]
pub struct ProjectScope {
    pub team: Team,
    pub project: Project,
    pub level: AccessLevel,
}

impl ProjectScope {
    pub fn rooms(&self) -> Vec<Room> {
        vec![Room::Project(self.project.id)]
    }
}

/// A task with its enclosing project scope.
#[derive(Debug, Clone)]
pub struct TaskScope {
    pub scope: ProjectScope,
    pub task: Task,
}

impl TaskScope {
    pub fn rooms(&self) -> Vec<Room> {
        vec![Room::Project(self.scope.project.id), Room::Task(self.task.id)]
    }
}

fn forbidden_for(required: AccessLevel) -> AccessError {
    match required {
        AccessLevel::Viewer => AccessError::Forbidden("You do not have access to this project"),
        AccessLevel::Contributor => {
            AccessError::Forbidden("Contributor access to this project is required")
        }
        AccessLevel::Manager => AccessError::Forbidden("Manager access to this project is required"),
    }
}

/// Load a live team the user belongs to.
pub async fn load_team(repos: &Repositories, team_id: i64, user_id: i64) -> Result<Team, AccessError> {
    let team = repos
        .teams
        .find_by_id(team_id)
        .await?
        .ok_or(AccessError::NotFound("Team"))?;
    if !AccessPolicy::can_view_team(&team, user_id) {
        return Err(AccessError::Forbidden("You are not a member of this team"));
    }
    Ok(team)
}

/// Resolve a project scope for an already loaded project.
pub async fn scope_for_project(
    repos: &Repositories,
    project: Project,
    user_id: i64,
    required: AccessLevel,
) -> Result<ProjectScope, AccessError> {
    // A deleted team hides its projects
    let team = repos
        .teams
        .find_by_id(project.team_id)
        .await?
        .ok_or(AccessError::NotFound("Project"))?;
    let level = AccessPolicy::project_access(&team, &project, user_id)
        .ok_or_else(|| forbidden_for(AccessLevel::Viewer))?;
    if level < required {
        return Err(forbidden_for(required));
    }
    Ok(ProjectScope {
        team,
        project,
        level,
    })
}

/// Load a live project and check the caller has at least `required` access.
pub async fn project_scope(
    repos: &Repositories,
    project_id: i64,
    user_id: i64,
    required: AccessLevel,
) -> Result<ProjectScope, AccessError> {
    let project = repos
        .projects
        .find_by_id(project_id)
        .await?
        .ok_or(AccessError::NotFound("Project"))?;
    scope_for_project(repos, project, user_id, required).await
}

/// Resolve a task scope for an already loaded task.
pub async fn scope_for_task(
    repos: &Repositories,
    task: Task,
    user_id: i64,
    required: AccessLevel,
) -> Result<TaskScope, AccessError> {
    // A deleted project hides its tasks
    let project = repos
        .projects
        .find_by_id(task.project_id)
        .await?
        .ok_or(AccessError::NotFound("Task"))?;
    let scope = scope_for_project(repos, project, user_id, required)
        .await
        .map_err(|e| match e {
            AccessError::NotFound(_) => AccessError::NotFound("Task"),
            other => other,
        })?;
    Ok(TaskScope { scope, task })
}

/// Load a live task and check the caller has at least `required` access.
pub async fn task_scope(
    repos: &Repositories,
    task_id: i64,
    user_id: i64,
    required: AccessLevel,
) -> Result<TaskScope, AccessError> {
    let task = repos
        .tasks
        .find_by_id(task_id)
        .await?
        .ok_or(AccessError::NotFound("Task"))?;
    scope_for_task(repos, task, user_id, required).await
}

/// Whether `user_id` may subscribe to `room`.
///
/// `Some(via)` grants the room; `via` lists the enclosing rooms the grant
/// depends on, so losing one of them also drops this room.
pub async fn authorize_room(
    repos: &Repositories,
    room: Room,
    user_id: i64,
) -> Result<Option<Vec<Room>>, AppError> {
    let result = match room {
        Room::User(id) => return Ok((id == user_id).then(Vec::new)),
        Room::Team(id) => load_team(repos, id, user_id).await.map(|_| Vec::new()),
        Room::Project(id) => project_scope(repos, id, user_id, AccessLevel::Viewer)
            .await
            .map(|scope| vec![Room::Team(scope.team.id)]),
        Room::Task(id) => task_scope(repos, id, user_id, AccessLevel::Viewer)
            .await
            .map(|scope| {
                vec![
                    Room::Team(scope.scope.team.id),
                    Room::Project(scope.scope.project.id),
                ]
            }),
    };
    match result {
        Ok(via) => Ok(Some(via)),
        Err(AccessError::Repository(e)) => Err(e),
        Err(_) => Ok(None),
    }
}

/// Ids among `user_ids` that can view the project. Order is preserved.
pub fn viewers_among(scope: &ProjectScope, user_ids: &[i64]) -> Vec<i64> {
    user_ids
        .iter()
        .copied()
        .filter(|id| AccessPolicy::project_access(&scope.team, &scope.project, *id).is_some())
        .collect()
}

/// Ids among `user_ids` that can currently view `project_id`. Empty once the
/// project or its team is gone.
pub async fn project_viewers(
    repos: &Repositories,
    project_id: i64,
    user_ids: &[i64],
) -> Result<Vec<i64>, AppError> {
    let Some(project) = repos.projects.find_by_id(project_id).await? else {
        return Ok(Vec::new());
    };
    let Some(team) = repos.teams.find_by_id(project.team_id).await? else {
        return Ok(Vec::new());
    };
    Ok(user_ids
        .iter()
        .copied()
        .filter(|id| AccessPolicy::project_access(&team, &project, *id).is_some())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProjectMember, ProjectRole, TeamMember, TeamRole};
    use crate::infrastructure::repositories::memory;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    /// Team 1 owned by user 1 with plain member 2 (project viewer) and 3 (no
    /// project role); project 10 holds task 100. User 4 is an outsider.
    async fn repos() -> Repositories {
        let repos = memory::repositories();
        repos.teams.create(&Team::new(1, "Core".into(), None, 1)).await.unwrap();
        for user_id in [2, 3] {
            repos.teams.add_member(1, &TeamMember::new(user_id, TeamRole::Member)).await.unwrap();
        }
        repos
            .projects
            .create(&Project::new(10, 1, "Roadmap".into(), 1))
            .await
            .unwrap();
        repos
            .projects
            .add_member(10, &ProjectMember::new(2, ProjectRole::Viewer))
            .await
            .unwrap();
        repos
            .tasks
            .create(&Task::new(100, 10, "Ship".into(), 1))
            .await
            .unwrap();
        repos
    }

    #[tokio::test]
    async fn test_personal_room_is_own_only() {
        let repos = repos().await;
        assert_eq!(authorize_room(&repos, Room::User(2), 2).await.unwrap(), Some(vec![]));
        assert_eq!(authorize_room(&repos, Room::User(1), 2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_team_room_needs_membership() {
        let repos = repos().await;
        assert_eq!(authorize_room(&repos, Room::Team(1), 3).await.unwrap(), Some(vec![]));
        assert_eq!(authorize_room(&repos, Room::Team(1), 4).await.unwrap(), None);
        assert_eq!(authorize_room(&repos, Room::Team(999), 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_project_and_task_rooms_follow_viewer_access() {
        let repos = repos().await;

        assert_eq!(
            authorize_room(&repos, Room::Project(10), 2).await.unwrap(),
            Some(vec![Room::Team(1)])
        );
        assert_eq!(
            authorize_room(&repos, Room::Task(100), 2).await.unwrap(),
            Some(vec![Room::Team(1), Room::Project(10)])
        );

        // Team member without a project role, and an outsider
        assert_eq!(authorize_room(&repos, Room::Project(10), 3).await.unwrap(), None);
        assert_eq!(authorize_room(&repos, Room::Task(100), 4).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_deleted_task_room_is_denied() {
        let repos = repos().await;
        repos.tasks.soft_delete(100, Utc::now()).await.unwrap();
        assert_eq!(authorize_room(&repos, Room::Task(100), 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_project_viewers_drops_users_without_access() {
        let repos = repos().await;
        assert_eq!(project_viewers(&repos, 10, &[1, 2, 3, 4]).await.unwrap(), vec![1, 2]);

        repos.projects.soft_delete(10, Utc::now()).await.unwrap();
        assert!(project_viewers(&repos, 10, &[1, 2]).await.unwrap().is_empty());
    }
}
