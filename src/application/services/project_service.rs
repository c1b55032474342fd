//! Project Service
//!
//! Projects inside a team, their explicit members and dashboard counters.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::access::{self, AccessError};
use super::activity_service::{ActivityRecorder, NewActivity};
use crate::application::dto::request::{
    AddProjectMemberRequest, CreateProjectRequest, UpdateProjectRequest,
};
use crate::application::realtime::{DeletedRef, EventBroadcaster, RealtimeEvent, Room};
use crate::domain::services::{AccessLevel, AccessPolicy};
use crate::domain::value_objects::ProjectFilter;
use crate::domain::{
    ActivityAction, EntityType, Project, ProjectMember, ProjectRole, ProjectStats, Repositories,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::{parse_id, required_text};

/// Listing criteria after parsing the query string.
#[derive(Debug, Clone, Default)]
pub struct ProjectQuery {
    pub team_id: Option<i64>,
    pub status: Option<crate::domain::ProjectStatus>,
    pub q: Option<String>,
}

/// Project service trait
#[async_trait]
pub trait ProjectService: Send + Sync {
    async fn create(&self, user_id: i64, request: CreateProjectRequest) -> Result<Project, ProjectError>;

    /// Projects the user can view, newest first
    async fn list(
        &self,
        user_id: i64,
        query: ProjectQuery,
        page: PageRequest,
    ) -> Result<Page<Project>, ProjectError>;

    async fn get(&self, user_id: i64, project_id: i64) -> Result<Project, ProjectError>;

    async fn update(
        &self,
        user_id: i64,
        project_id: i64,
        request: UpdateProjectRequest,
    ) -> Result<Project, ProjectError>;

    async fn delete(&self, user_id: i64, project_id: i64) -> Result<(), ProjectError>;

    async fn members(&self, user_id: i64, project_id: i64) -> Result<Vec<ProjectMember>, ProjectError>;

    async fn add_member(
        &self,
        user_id: i64,
        project_id: i64,
        request: AddProjectMemberRequest,
    ) -> Result<ProjectMember, ProjectError>;

    async fn change_member_role(
        &self,
        user_id: i64,
        project_id: i64,
        target_id: i64,
        role: ProjectRole,
    ) -> Result<ProjectMember, ProjectError>;

    /// Managers remove anyone; members may remove themselves
    async fn remove_member(&self, user_id: i64, project_id: i64, target_id: i64) -> Result<(), ProjectError>;

    async fn stats(&self, user_id: i64, project_id: i64) -> Result<ProjectStats, ProjectError>;
}

/// Project service errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("User is not a member of the project's team")]
    NotTeamMember,

    #[error("User is already a member of this project")]
    AlreadyMember,

    #[error("Member not found")]
    MemberNotFound,

    #[error("Start date must not be after the due date")]
    InvalidDates,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<ProjectError> for AppError {
    fn from(e: ProjectError) -> Self {
        match e {
            ProjectError::Access(e) => e.into(),
            ProjectError::NotTeamMember => AppError::invalid_field("user_id", e.to_string()),
            ProjectError::InvalidDates => AppError::invalid_field("due_date", e.to_string()),
            ProjectError::AlreadyMember => AppError::Conflict(e.to_string()),
            ProjectError::MemberNotFound => AppError::NotFound(e.to_string()),
            ProjectError::Repository(e) => e,
        }
    }
}

fn check_dates(project: &Project) -> Result<(), ProjectError> {
    match (project.start_date, project.due_date) {
        (Some(start), Some(due)) if start > due => Err(ProjectError::InvalidDates),
        _ => Ok(()),
    }
}

/// ProjectService implementation
pub struct ProjectServiceImpl {
    repos: Repositories,
    id_generator: Arc<SnowflakeGenerator>,
    events: Arc<dyn EventBroadcaster>,
    activity: ActivityRecorder,
}

impl ProjectServiceImpl {
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

    /// Reload after a membership change so callers see fresh member lists.
    async fn reload(&self, project_id: i64) -> Result<Project, ProjectError> {
        Ok(self
            .repos
            .projects
            .find_by_id(project_id)
            .await?
            .ok_or(AccessError::NotFound("Project"))?)
    }
}

#[async_trait]
impl ProjectService for ProjectServiceImpl {
    async fn create(&self, user_id: i64, request: CreateProjectRequest) -> Result<Project, ProjectError> {
        let team_id = parse_id(&request.team_id, "team")?;
        let team = access::load_team(&self.repos, team_id, user_id).await?;

        let mut project = Project::new(
            self.id_generator.generate(),
            team.id,
            required_text(&request.name, "name")?,
            user_id,
        );
        project.description = request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        project.status = request.status.unwrap_or_default();
        project.start_date = request.start_date;
        project.due_date = request.due_date;
        check_dates(&project)?;

        let project = self.repos.projects.create(&project).await?;

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Project, project.id, ActivityAction::Created)
                    .in_team(team.id)
                    .with_metadata(json!({ "name": project.name })),
            )
            .await;

        tracing::info!(project_id = project.id, team_id, user_id, "Project created");
        Ok(project)
    }

    async fn list(
        &self,
        user_id: i64,
        query: ProjectQuery,
        page: PageRequest,
    ) -> Result<Page<Project>, ProjectError> {
        if let Some(team_id) = query.team_id {
            access::load_team(&self.repos, team_id, user_id).await?;
        }

        let filter = ProjectFilter {
            viewer_id: user_id,
            team_id: query.team_id,
            status: query.status,
            q: query.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty()),
        };
        Ok(self.repos.projects.list(&filter, page).await?)
    }

    async fn get(&self, user_id: i64, project_id: i64) -> Result<Project, ProjectError> {
        let scope = access::project_scope(&self.repos, project_id, user_id, AccessLevel::Viewer).await?;
        Ok(scope.project)
    }

    async fn update(
        &self,
        user_id: i64,
        project_id: i64,
        request: UpdateProjectRequest,
    ) -> Result<Project, ProjectError> {
        let scope = access::project_scope(&self.repos, project_id, user_id, AccessLevel::Manager).await?;
        let mut project = scope.project.clone();
        let previous_status = project.status;

        if let Some(name) = request.name {
            project.name = required_text(&name, "name")?;
        }
        if let Some(description) = request.description {
            project.description = description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
        }
        if let Some(status) = request.status {
            project.status = status;
        }
        if let Some(start_date) = request.start_date {
            project.start_date = start_date;
        }
        if let Some(due_date) = request.due_date {
            project.due_date = due_date;
        }
        check_dates(&project)?;

        project.updated_at = Utc::now();
        let project = self.repos.projects.update(&project).await?;

        let action = if project.status != previous_status {
            ActivityAction::StatusChanged
        } else {
            ActivityAction::Updated
        };
        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Project, project.id, action)
                    .in_project(&scope)
                    .with_metadata(json!({ "from": previous_status, "to": project.status })),
            )
            .await;
        self.events
            .publish(&scope.rooms(), RealtimeEvent::ProjectUpdated(project.clone().into()));

        Ok(project)
    }

    async fn delete(&self, user_id: i64, project_id: i64) -> Result<(), ProjectError> {
        let scope = access::project_scope(&self.repos, project_id, user_id, AccessLevel::Manager).await?;
        self.repos.projects.soft_delete(project_id, Utc::now()).await?;
        self.events.close_rooms(&[Room::Project(project_id)]);

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Project, project_id, ActivityAction::Deleted)
                    .in_project(&scope),
            )
            .await;
        self.events.publish(
            &[Room::Project(project_id), Room::Team(scope.team.id)],
            RealtimeEvent::ProjectDeleted(DeletedRef::new(project_id, Some(scope.team.id))),
        );

        tracing::info!(project_id, user_id, "Project deleted");
        Ok(())
    }

    async fn members(&self, user_id: i64, project_id: i64) -> Result<Vec<ProjectMember>, ProjectError> {
        let scope = access::project_scope(&self.repos, project_id, user_id, AccessLevel::Viewer).await?;
        Ok(scope.project.members)
    }

    async fn add_member(
        &self,
        user_id: i64,
        project_id: i64,
        request: AddProjectMemberRequest,
    ) -> Result<ProjectMember, ProjectError> {
        let scope = access::project_scope(&self.repos, project_id, user_id, AccessLevel::Manager).await?;
        let target_id = parse_id(&request.user_id, "user")?;

        if !scope.team.is_member(target_id) {
            return Err(ProjectError::NotTeamMember);
        }
        if scope.project.member(target_id).is_some() {
            return Err(ProjectError::AlreadyMember);
        }

        let member = ProjectMember::new(target_id, request.role.unwrap_or(ProjectRole::Contributor));
        self.repos.projects.add_member(project_id, &member).await?;

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Project, project_id, ActivityAction::MemberAdded)
                    .in_project(&scope)
                    .with_metadata(json!({ "user_id": target_id.to_string(), "role": member.role })),
            )
            .await;
        self.publish_updated(&scope.rooms(), project_id).await;

        Ok(member)
    }

    async fn change_member_role(
        &self,
        user_id: i64,
        project_id: i64,
        target_id: i64,
        role: ProjectRole,
    ) -> Result<ProjectMember, ProjectError> {
        let scope = access::project_scope(&self.repos, project_id, user_id, AccessLevel::Manager).await?;
        let mut member = scope
            .project
            .member(target_id)
            .cloned()
            .ok_or(ProjectError::MemberNotFound)?;

        if member.role != role {
            self.repos
                .projects
                .update_member_role(project_id, target_id, role)
                .await?;
            self.activity
                .record(
                    NewActivity::new(
                        user_id,
                        EntityType::Project,
                        project_id,
                        ActivityAction::MemberRoleChanged,
                    )
                    .in_project(&scope)
                    .with_metadata(json!({
                        "user_id": target_id.to_string(),
                        "from": member.role,
                        "to": role,
                    })),
                )
                .await;
            member.role = role;
            self.publish_updated(&scope.rooms(), project_id).await;
        }

        Ok(member)
    }

    async fn remove_member(&self, user_id: i64, project_id: i64, target_id: i64) -> Result<(), ProjectError> {
        let required = if user_id == target_id {
            AccessLevel::Viewer
        } else {
            AccessLevel::Manager
        };
        let scope = access::project_scope(&self.repos, project_id, user_id, required).await?;
        if scope.project.member(target_id).is_none() {
            return Err(ProjectError::MemberNotFound);
        }

        self.repos.projects.remove_member(project_id, target_id).await?;

        // Team owners and admins keep access without a project role
        let project = self.reload(project_id).await?;
        if AccessPolicy::project_access(&scope.team, &project, target_id).is_none() {
            self.events.revoke(target_id, &[Room::Project(project_id)]);
        }

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Project, project_id, ActivityAction::MemberRemoved)
                    .in_project(&scope)
                    .with_metadata(json!({ "user_id": target_id.to_string() })),
            )
            .await;
        self.publish_updated(&scope.rooms(), project_id).await;

        Ok(())
    }

    async fn stats(&self, user_id: i64, project_id: i64) -> Result<ProjectStats, ProjectError> {
        access::project_scope(&self.repos, project_id, user_id, AccessLevel::Viewer).await?;
        Ok(self.repos.projects.stats(project_id, Utc::now()).await?)
    }
}

impl ProjectServiceImpl {
    async fn publish_updated(&self, rooms: &[Room], project_id: i64) {
        match self.reload(project_id).await {
            Ok(project) => self
                .events
                .publish(rooms, RealtimeEvent::ProjectUpdated(project.into())),
            Err(e) => tracing::warn!(project_id, error = %e, "Failed to reload project for event"),
        }
    }
}
