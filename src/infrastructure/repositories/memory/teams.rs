//! In-memory teams and projects.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{project_is_live, MemoryStore};
use crate::domain::services::AccessPolicy;
use crate::domain::{
    Project, ProjectFilter, ProjectMember, ProjectRepository, ProjectRole, ProjectStats, Team,
    TaskStatus, TeamMember, TeamRepository, TeamRole,
};
use crate::shared::error::AppError;
use crate::shared::pagination::{Page, PageRequest};

#[derive(Clone)]
pub struct MemoryTeamRepository {
    store: Arc<MemoryStore>,
}

impl MemoryTeamRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

fn team_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Team {} not found", id))
}

#[async_trait]
impl TeamRepository for MemoryTeamRepository {
    async fn create(&self, team: &Team) -> Result<Team, AppError> {
        let mut teams = self.store.teams.write();
        if teams.contains_key(&team.id) {
            return Err(AppError::Conflict(format!("Team {} already exists", team.id)));
        }
        teams.insert(team.id, team.clone());
        Ok(team.clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Team>, AppError> {
        let teams = self.store.teams.read();
        Ok(teams.get(&id).filter(|t| !t.is_deleted()).cloned())
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Team>, AppError> {
        let teams = self.store.teams.read();
        let mut mine: Vec<Team> = teams
            .values()
            .filter(|t| !t.is_deleted() && t.is_member(user_id))
            .cloned()
            .collect();
        mine.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(mine)
    }

    async fn update(&self, team: &Team) -> Result<Team, AppError> {
        let mut teams = self.store.teams.write();
        let stored = teams
            .get_mut(&team.id)
            .filter(|t| !t.is_deleted())
            .ok_or_else(|| team_not_found(team.id))?;
        stored.name = team.name.clone();
        stored.description = team.description.clone();
        stored.updated_at = team.updated_at;
        Ok(stored.clone())
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(team) = self.store.teams.write().get_mut(&id) {
            team.deleted_at.get_or_insert(at);
        }
        Ok(())
    }

    async fn add_member(&self, team_id: i64, member: &TeamMember) -> Result<(), AppError> {
        let mut teams = self.store.teams.write();
        let team = teams.get_mut(&team_id).ok_or_else(|| team_not_found(team_id))?;
        if team.is_member(member.user_id) {
            return Err(AppError::Conflict(
                "User is already a member of this team".into(),
            ));
        }
        team.members.push(member.clone());
        Ok(())
    }

    async fn update_member_role(
        &self,
        team_id: i64,
        user_id: i64,
        role: TeamRole,
    ) -> Result<(), AppError> {
        let mut teams = self.store.teams.write();
        let member = teams
            .get_mut(&team_id)
            .and_then(|t| t.members.iter_mut().find(|m| m.user_id == user_id))
            .ok_or_else(|| AppError::NotFound("Team member not found".into()))?;
        member.role = role;
        Ok(())
    }

    async fn remove_member(&self, team_id: i64, user_id: i64) -> Result<(), AppError> {
        let mut teams = self.store.teams.write();
        let mut projects = self.store.projects.write();
        if let Some(team) = teams.get_mut(&team_id) {
            team.members.retain(|m| m.user_id != user_id);
        }
        for project in projects.values_mut().filter(|p| p.team_id == team_id) {
            project.members.retain(|m| m.user_id != user_id);
        }
        Ok(())
    }

    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let purged: HashSet<i64> = {
            let mut teams = self.store.teams.write();
            let ids: HashSet<i64> = teams
                .values()
                .filter(|t| t.deleted_at.map(|at| at < before).unwrap_or(false))
                .map(|t| t.id)
                .collect();
            teams.retain(|id, _| !ids.contains(id));
            ids
        };
        let projects: HashSet<i64> = {
            let mut projects = self.store.projects.write();
            let ids = projects
                .values()
                .filter(|p| purged.contains(&p.team_id))
                .map(|p| p.id)
                .collect();
            projects.retain(|_, p| !purged.contains(&p.team_id));
            ids
        };
        self.store.cascade_projects(&projects);
        Ok(purged.len() as u64)
    }
}

#[derive(Clone)]
pub struct MemoryProjectRepository {
    store: Arc<MemoryStore>,
}

impl MemoryProjectRepository {
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }
}

fn project_not_found(id: i64) -> AppError {
    AppError::NotFound(format!("Project {} not found", id))
}

#[async_trait]
impl ProjectRepository for MemoryProjectRepository {
    async fn create(&self, project: &Project) -> Result<Project, AppError> {
        let mut projects = self.store.projects.write();
        if projects.contains_key(&project.id) {
            return Err(AppError::Conflict(format!(
                "Project {} already exists",
                project.id
            )));
        }
        projects.insert(project.id, project.clone());
        Ok(project.clone())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Project>, AppError> {
        let teams = self.store.teams.read();
        let projects = self.store.projects.read();
        Ok(projects
            .get(&id)
            .filter(|p| project_is_live(&teams, p))
            .cloned())
    }

    async fn list(
        &self,
        filter: &ProjectFilter,
        page: PageRequest,
    ) -> Result<Page<Project>, AppError> {
        let teams = self.store.teams.read();
        let projects = self.store.projects.read();
        let q = filter.q.as_deref().map(str::to_lowercase);

        let mut visible: Vec<Project> = projects
            .values()
            .filter(|p| project_is_live(&teams, p))
            .filter(|p| {
                teams
                    .get(&p.team_id)
                    .and_then(|team| AccessPolicy::project_access(team, p, filter.viewer_id))
                    .is_some()
            })
            .filter(|p| filter.team_id.map(|id| p.team_id == id).unwrap_or(true))
            .filter(|p| filter.status.map(|s| p.status == s).unwrap_or(true))
            .filter(|p| {
                q.as_deref()
                    .map(|q| p.name.to_lowercase().contains(q))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(Page::from_vec(visible, page))
    }

    async fn update(&self, project: &Project) -> Result<Project, AppError> {
        let mut projects = self.store.projects.write();
        let stored = projects
            .get_mut(&project.id)
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| project_not_found(project.id))?;
        stored.name = project.name.clone();
        stored.description = project.description.clone();
        stored.status = project.status;
        stored.start_date = project.start_date;
        stored.due_date = project.due_date;
        stored.updated_at = project.updated_at;
        Ok(stored.clone())
    }

    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(project) = self.store.projects.write().get_mut(&id) {
            project.deleted_at.get_or_insert(at);
        }
        Ok(())
    }

    async fn add_member(&self, project_id: i64, member: &ProjectMember) -> Result<(), AppError> {
        let mut projects = self.store.projects.write();
        let project = projects
            .get_mut(&project_id)
            .ok_or_else(|| project_not_found(project_id))?;
        if project.member(member.user_id).is_some() {
            return Err(AppError::Conflict(
                "User is already a member of this project".into(),
            ));
        }
        project.members.push(member.clone());
        Ok(())
    }

    async fn update_member_role(
        &self,
        project_id: i64,
        user_id: i64,
        role: ProjectRole,
    ) -> Result<(), AppError> {
        let mut projects = self.store.projects.write();
        let member = projects
            .get_mut(&project_id)
            .and_then(|p| p.members.iter_mut().find(|m| m.user_id == user_id))
            .ok_or_else(|| AppError::NotFound("Project member not found".into()))?;
        member.role = role;
        Ok(())
    }

    async fn remove_member(&self, project_id: i64, user_id: i64) -> Result<(), AppError> {
        if let Some(project) = self.store.projects.write().get_mut(&project_id) {
            project.members.retain(|m| m.user_id != user_id);
        }
        Ok(())
    }

    async fn stats(&self, project_id: i64, now: DateTime<Utc>) -> Result<ProjectStats, AppError> {
        let tasks = self.store.tasks.read();
        let mut stats = ProjectStats::default();
        for task in tasks
            .values()
            .filter(|t| t.project_id == project_id && !t.is_deleted())
        {
            stats.total += 1;
            match task.status {
                TaskStatus::Todo => stats.todo += 1,
                TaskStatus::InProgress => stats.in_progress += 1,
                TaskStatus::InReview => stats.in_review += 1,
                TaskStatus::Done => stats.done += 1,
            }
            if task.is_overdue(now) {
                stats.overdue += 1;
            }
        }
        Ok(stats)
    }

    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let purged: HashSet<i64> = {
            let mut projects = self.store.projects.write();
            let ids: HashSet<i64> = projects
                .values()
                .filter(|p| p.deleted_at.map(|at| at < before).unwrap_or(false))
                .map(|p| p.id)
                .collect();
            projects.retain(|id, _| !ids.contains(id));
            ids
        };
        self.store.cascade_projects(&purged);
        Ok(purged.len() as u64)
    }
}
