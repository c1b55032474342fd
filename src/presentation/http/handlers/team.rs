//! Team Handlers

use axum::{extract::State, http::StatusCode, Json};

use crate::application::dto::request::{
    AddTeamMemberRequest, CreateTeamRequest, UpdateTeamMemberRequest, UpdateTeamRequest,
};
use crate::application::dto::response::{PresenceResponse, TeamMemberResponse, TeamResponse};
use crate::presentation::http::extractors::{AuthUser, Path, ValidatedJson};
use crate::shared::error::AppError;
use crate::shared::validation::parse_id;
use crate::startup::AppState;

/// Create a new team owned by the caller
pub async fn create_team(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(body): ValidatedJson<CreateTeamRequest>,
) -> Result<(StatusCode, Json<TeamResponse>), AppError> {
    let team = state.teams.create(auth.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(TeamResponse::from(team))))
}

/// Teams the caller belongs to
pub async fn list_teams(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<TeamResponse>>, AppError> {
    let teams = state.teams.list_mine(auth.user_id).await?;
    Ok(Json(teams.into_iter().map(TeamResponse::from).collect()))
}

pub async fn get_team(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(team_id): Path<String>,
) -> Result<Json<TeamResponse>, AppError> {
    let team_id = parse_id(&team_id, "team")?;
    let team = state.teams.get(auth.user_id, team_id).await?;
    Ok(Json(TeamResponse::from(team)))
}

pub async fn update_team(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(team_id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateTeamRequest>,
) -> Result<Json<TeamResponse>, AppError> {
    let team_id = parse_id(&team_id, "team")?;
    let team = state.teams.update(auth.user_id, team_id, body).await?;
    Ok(Json(TeamResponse::from(team)))
}

pub async fn delete_team(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(team_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let team_id = parse_id(&team_id, "team")?;
    state.teams.delete(auth.user_id, team_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(team_id): Path<String>,
) -> Result<Json<Vec<TeamMemberResponse>>, AppError> {
    let team_id = parse_id(&team_id, "team")?;
    let members = state.teams.members(auth.user_id, team_id).await?;
    Ok(Json(members.into_iter().map(TeamMemberResponse::from).collect()))
}

pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(team_id): Path<String>,
    ValidatedJson(body): ValidatedJson<AddTeamMemberRequest>,
) -> Result<(StatusCode, Json<TeamMemberResponse>), AppError> {
    let team_id = parse_id(&team_id, "team")?;
    let member = state.teams.add_member(auth.user_id, team_id, body).await?;
    Ok((StatusCode::CREATED, Json(TeamMemberResponse::from(member))))
}

pub async fn update_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((team_id, member_id)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<UpdateTeamMemberRequest>,
) -> Result<Json<TeamMemberResponse>, AppError> {
    let team_id = parse_id(&team_id, "team")?;
    let member_id = parse_id(&member_id, "user")?;
    let member = state
        .teams
        .change_member_role(auth.user_id, team_id, member_id, body.role)
        .await?;
    Ok(Json(TeamMemberResponse::from(member)))
}

/// Remove a member; removing yourself leaves the team
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((team_id, member_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let team_id = parse_id(&team_id, "team")?;
    let member_id = parse_id(&member_id, "user")?;
    state.teams.remove_member(auth.user_id, team_id, member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Members currently connected to the gateway
pub async fn presence(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(team_id): Path<String>,
) -> Result<Json<PresenceResponse>, AppError> {
    let team_id = parse_id(&team_id, "team")?;
    let online = state.teams.presence(auth.user_id, team_id).await?;
    Ok(Json(PresenceResponse::new(team_id, &online)))
}
