//! Project Handlers

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::request::{
    AddProjectMemberRequest, CreateProjectRequest, ProjectListQuery, UpdateProjectMemberRequest,
    UpdateProjectRequest,
};
use crate::application::dto::response::{
    PageResponse, ProjectMemberResponse, ProjectResponse, ProjectStatsResponse,
};
use crate::application::services::ProjectQuery;
use crate::presentation::http::extractors::{page_request, AuthUser, Path, Query, ValidatedJson};
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

/// Create a project inside a team; the creator becomes its manager
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectResponse>), AppError> {
    let project = state.projects.create(auth.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(ProjectResponse::from(project))))
}

/// Projects visible to the caller, optionally narrowed to one team
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ProjectListQuery>,
) -> Result<Json<PageResponse<ProjectResponse>>, AppError> {
    let page = page_request(&state, query.page, query.limit);
    let team_id = query
        .team_id
        .as_deref()
        .map(|raw| parse_id(raw, "team"))
        .transpose()?;

    let criteria = ProjectQuery {
        team_id,
        status: query.status,
        q: query.q.filter(|q| !q.trim().is_empty()),
    };

    let projects = state.projects.list(auth.user_id, criteria, page).await?;
    Ok(Json(projects.into()))
}

pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectResponse>, AppError> {
    let project_id = parse_id(&project_id, "project")?;
    let project = state.projects.get(auth.user_id, project_id).await?;
    Ok(Json(ProjectResponse::from(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateProjectRequest>,
) -> Result<Json<ProjectResponse>, AppError> {
    let project_id = parse_id(&project_id, "project")?;
    let project = state.projects.update(auth.user_id, project_id, body).await?;
    Ok(Json(ProjectResponse::from(project)))
}

pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let project_id = parse_id(&project_id, "project")?;
    state.projects.delete(auth.user_id, project_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<ProjectMemberResponse>>, AppError> {
    let project_id = parse_id(&project_id, "project")?;
    let members = state.projects.members(auth.user_id, project_id).await?;
    Ok(Json(members.into_iter().map(ProjectMemberResponse::from).collect()))
}

pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<String>,
    ValidatedJson(body): ValidatedJson<AddProjectMemberRequest>,
) -> Result<(StatusCode, Json<ProjectMemberResponse>), AppError> {
    let project_id = parse_id(&project_id, "project")?;
    let member = state.projects.add_member(auth.user_id, project_id, body).await?;
    Ok((StatusCode::CREATED, Json(ProjectMemberResponse::from(member))))
}

pub async fn update_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, member_id)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<UpdateProjectMemberRequest>,
) -> Result<Json<ProjectMemberResponse>, AppError> {
    let project_id = parse_id(&project_id, "project")?;
    let member_id = parse_id(&member_id, "user")?;
    let member = state
        .projects
        .change_member_role(auth.user_id, project_id, member_id, body.role)
        .await?;
    Ok(Json(ProjectMemberResponse::from(member)))
}

pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((project_id, member_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let project_id = parse_id(&project_id, "project")?;
    let member_id = parse_id(&member_id, "user")?;
    state
        .projects
        .remove_member(auth.user_id, project_id, member_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Task counts by status plus overdue count
pub async fn project_stats(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectStatsResponse>, AppError> {
    let project_id = parse_id(&project_id, "project")?;
    let stats = state.projects.stats(auth.user_id, project_id).await?;
    Ok(Json(ProjectStatsResponse {
        project_id: project_id.to_string(),
        stats,
    }))
}
