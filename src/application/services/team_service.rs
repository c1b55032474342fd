//! Team Service
//!
//! Team lifecycle and membership.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::access::{self, AccessError};
use super::activity_service::{ActivityRecorder, NewActivity};
use super::notification_service::{NotificationDraft, NotificationService};
use crate::application::dto::request::{AddTeamMemberRequest, CreateTeamRequest, UpdateTeamRequest};
use crate::application::realtime::{
    EventBroadcaster, RealtimeEvent, Room, TeamMemberEvent, TeamMemberRemovedEvent,
};
use crate::domain::services::{AccessPolicy, PolicyError};
use crate::domain::value_objects::ProjectFilter;
use crate::domain::{
    ActivityAction, EntityType, NotificationKind, Repositories, Team, TeamMember, TeamRole,
};
use crate::shared::error::AppError;
use crate::shared::pagination::PageRequest;
use crate::shared::snowflake::SnowflakeGenerator;
use crate::shared::validation::{parse_id, required_text};

/// Team service trait
#[async_trait]
pub trait TeamService: Send + Sync {
    /// Create a team owned by `user_id`
    async fn create(&self, user_id: i64, request: CreateTeamRequest) -> Result<Team, TeamError>;

    /// Teams the user belongs to
    async fn list_mine(&self, user_id: i64) -> Result<Vec<Team>, TeamError>;

    async fn get(&self, user_id: i64, team_id: i64) -> Result<Team, TeamError>;

    async fn update(&self, user_id: i64, team_id: i64, request: UpdateTeamRequest) -> Result<Team, TeamError>;

    /// Soft delete (owner only)
    async fn delete(&self, user_id: i64, team_id: i64) -> Result<(), TeamError>;

    async fn members(&self, user_id: i64, team_id: i64) -> Result<Vec<TeamMember>, TeamError>;

    async fn add_member(
        &self,
        user_id: i64,
        team_id: i64,
        request: AddTeamMemberRequest,
    ) -> Result<TeamMember, TeamError>;

    async fn change_member_role(
        &self,
        user_id: i64,
        team_id: i64,
        target_id: i64,
        role: TeamRole,
    ) -> Result<TeamMember, TeamError>;

    /// Remove a member, or leave when `target_id == user_id`
    async fn remove_member(&self, user_id: i64, team_id: i64, target_id: i64) -> Result<(), TeamError>;

    /// Members with at least one live socket
    async fn presence(&self, user_id: i64, team_id: i64) -> Result<Vec<i64>, TeamError>;
}

/// Team service errors
#[derive(Debug, thiserror::Error)]
pub enum TeamError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("User not found")]
    UserNotFound,

    #[error("User is already a member of this team")]
    AlreadyMember,

    #[error("Member not found")]
    MemberNotFound,

    #[error(transparent)]
    Repository(#[from] AppError),
}

impl From<TeamError> for AppError {
    fn from(e: TeamError) -> Self {
        match e {
            TeamError::Access(e) => e.into(),
            TeamError::Policy(PolicyError::Forbidden(msg)) => AppError::Forbidden(msg.into()),
            TeamError::Policy(PolicyError::Invalid(msg)) => AppError::validation(msg),
            TeamError::UserNotFound | TeamError::MemberNotFound => AppError::NotFound(e.to_string()),
            TeamError::AlreadyMember => AppError::Conflict(e.to_string()),
            TeamError::Repository(e) => e,
        }
    }
}

/// TeamService implementation
pub struct TeamServiceImpl {
    repos: Repositories,
    id_generator: Arc<SnowflakeGenerator>,
    events: Arc<dyn EventBroadcaster>,
    notifications: Arc<dyn NotificationService>,
    activity: ActivityRecorder,
}

impl TeamServiceImpl {
    pub fn new(
        repos: Repositories,
        id_generator: Arc<SnowflakeGenerator>,
        events: Arc<dyn EventBroadcaster>,
        notifications: Arc<dyn NotificationService>,
        activity: ActivityRecorder,
    ) -> Self {
        Self {
            repos,
            id_generator,
            events,
            notifications,
            activity,
        }
    }

    fn member_of(team: &Team, user_id: i64) -> Result<TeamMember, TeamError> {
        team.member(user_id).cloned().ok_or(TeamError::MemberNotFound)
    }

    /// Project rooms of `team` that `user_id` cannot view under its current roles.
    async fn unreachable_project_rooms(&self, team: &Team, user_id: i64) -> Result<Vec<Room>, TeamError> {
        // The owner sees every project of the team
        let filter = ProjectFilter {
            viewer_id: team.owner_id,
            team_id: Some(team.id),
            ..Default::default()
        };
        let mut page = PageRequest { page: 1, limit: 100 };
        let mut rooms = Vec::new();
        loop {
            let batch = self.repos.projects.list(&filter, page).await?;
            rooms.extend(
                batch
                    .items
                    .iter()
                    .filter(|p| AccessPolicy::project_access(team, p, user_id).is_none())
                    .map(|p| Room::Project(p.id)),
            );
            if page.page >= batch.total_pages {
                break;
            }
            page.page += 1;
        }
        Ok(rooms)
    }
}

#[async_trait]
impl TeamService for TeamServiceImpl {
    async fn create(&self, user_id: i64, request: CreateTeamRequest) -> Result<Team, TeamError> {
        let description = request
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let team = Team::new(
            self.id_generator.generate(),
            required_text(&request.name, "name")?,
            description,
            user_id,
        );
        let team = self.repos.teams.create(&team).await?;

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Team, team.id, ActivityAction::Created)
                    .in_team(team.id)
                    .with_metadata(json!({ "name": team.name })),
            )
            .await;

        tracing::info!(team_id = team.id, owner_id = user_id, "Team created");
        Ok(team)
    }

    async fn list_mine(&self, user_id: i64) -> Result<Vec<Team>, TeamError> {
        Ok(self.repos.teams.list_for_user(user_id).await?)
    }

    async fn get(&self, user_id: i64, team_id: i64) -> Result<Team, TeamError> {
        Ok(access::load_team(&self.repos, team_id, user_id).await?)
    }

    async fn update(&self, user_id: i64, team_id: i64, request: UpdateTeamRequest) -> Result<Team, TeamError> {
        let mut team = access::load_team(&self.repos, team_id, user_id).await?;
        if !AccessPolicy::can_manage_team(&team, user_id) {
            return Err(PolicyError::Forbidden("Only team owners and admins can update the team").into());
        }

        if let Some(name) = request.name {
            team.name = required_text(&name, "name")?;
        }
        if let Some(description) = request.description {
            team.description = description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
        }
        team.updated_at = Utc::now();
        let team = self.repos.teams.update(&team).await?;

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Team, team.id, ActivityAction::Updated)
                    .in_team(team.id),
            )
            .await;
        self.events
            .publish(&[Room::Team(team.id)], RealtimeEvent::TeamUpdated(team.clone().into()));
        Ok(team)
    }

    async fn delete(&self, user_id: i64, team_id: i64) -> Result<(), TeamError> {
        let team = access::load_team(&self.repos, team_id, user_id).await?;
        if !AccessPolicy::can_delete_team(&team, user_id) {
            return Err(PolicyError::Forbidden("Only the team owner can delete the team").into());
        }

        self.repos.teams.soft_delete(team.id, Utc::now()).await?;
        self.events.close_rooms(&[Room::Team(team.id)]);
        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Team, team.id, ActivityAction::Deleted)
                    .in_team(team.id),
            )
            .await;

        tracing::info!(team_id, user_id, "Team deleted");
        Ok(())
    }

    async fn members(&self, user_id: i64, team_id: i64) -> Result<Vec<TeamMember>, TeamError> {
        let team = access::load_team(&self.repos, team_id, user_id).await?;
        Ok(team.members)
    }

    async fn add_member(
        &self,
        user_id: i64,
        team_id: i64,
        request: AddTeamMemberRequest,
    ) -> Result<TeamMember, TeamError> {
        let team = access::load_team(&self.repos, team_id, user_id).await?;
        let role = request.role.unwrap_or(TeamRole::Member);
        AccessPolicy::check_add_team_member(&team, user_id, role)?;

        let target_id = parse_id(&request.user_id, "user")?;
        let target = self
            .repos
            .users
            .find_by_id(target_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(TeamError::UserNotFound)?;
        if team.is_member(target.id) {
            return Err(TeamError::AlreadyMember);
        }

        let member = TeamMember::new(target.id, role);
        self.repos.teams.add_member(team.id, &member).await?;

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Team, team.id, ActivityAction::MemberAdded)
                    .in_team(team.id)
                    .with_metadata(json!({ "user_id": target.id.to_string(), "role": role })),
            )
            .await;
        self.events.publish(
            &[Room::Team(team.id), Room::User(target.id)],
            RealtimeEvent::TeamMemberAdded(TeamMemberEvent {
                team_id: team.id.to_string(),
                member: member.clone().into(),
            }),
        );

        let draft = NotificationDraft {
            kind: NotificationKind::TeamMemberAdded,
            actor_id: Some(user_id),
            title: format!("You were added to the team \"{}\"", team.name),
            body: None,
            entity_type: EntityType::Team,
            entity_id: team.id,
        };
        if let Err(e) = self.notifications.notify(&[target.id], draft).await {
            tracing::warn!(team_id, error = %e, "Failed to enqueue team notification");
        }

        Ok(member)
    }

    async fn change_member_role(
        &self,
        user_id: i64,
        team_id: i64,
        target_id: i64,
        role: TeamRole,
    ) -> Result<TeamMember, TeamError> {
        let mut team = access::load_team(&self.repos, team_id, user_id).await?;
        let mut member = Self::member_of(&team, target_id)?;
        AccessPolicy::check_change_team_role(&team, user_id, target_id, role)?;

        if member.role != role {
            self.repos.teams.update_member_role(team.id, target_id, role).await?;
            if member.role.can_manage() && !role.can_manage() {
                if let Some(m) = team.members.iter_mut().find(|m| m.user_id == target_id) {
                    m.role = role;
                }
                let lost = self.unreachable_project_rooms(&team, target_id).await?;
                self.events.revoke(target_id, &lost);
            }
            self.activity
                .record(
                    NewActivity::new(user_id, EntityType::Team, team.id, ActivityAction::MemberRoleChanged)
                        .in_team(team.id)
                        .with_metadata(json!({
                            "user_id": target_id.to_string(),
                            "from": member.role,
                            "to": role,
                        })),
                )
                .await;
            member.role = role;
        }

        Ok(member)
    }

    async fn remove_member(&self, user_id: i64, team_id: i64, target_id: i64) -> Result<(), TeamError> {
        let team = access::load_team(&self.repos, team_id, user_id).await?;
        Self::member_of(&team, target_id)?;
        AccessPolicy::check_remove_team_member(&team, user_id, target_id)?;

        self.repos.teams.remove_member(team.id, target_id).await?;
        // Project and task rooms were granted through the team room
        self.events.revoke(target_id, &[Room::Team(team.id)]);

        self.activity
            .record(
                NewActivity::new(user_id, EntityType::Team, team.id, ActivityAction::MemberRemoved)
                    .in_team(team.id)
                    .with_metadata(json!({ "user_id": target_id.to_string() })),
            )
            .await;
        self.events.publish(
            &[Room::Team(team.id), Room::User(target_id)],
            RealtimeEvent::TeamMemberRemoved(TeamMemberRemovedEvent {
                team_id: team.id.to_string(),
                user_id: target_id.to_string(),
            }),
        );

        tracing::info!(team_id, user_id, target_id, "Team member removed");
        Ok(())
    }

    async fn presence(&self, user_id: i64, team_id: i64) -> Result<Vec<i64>, TeamError> {
        let team = access::load_team(&self.repos, team_id, user_id).await?;
        Ok(self.events.online_users(&team.member_ids()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::jobs::JobQueue;
    use crate::application::realtime::MockEventBroadcaster;
    use crate::application::services::NotificationServiceImpl;
    use crate::domain::{Project, ProjectMember, ProjectRole, User};
    use crate::infrastructure::queue::MemoryJobQueue;
    use crate::infrastructure::repositories::memory;

    struct Fixture {
        repos: Repositories,
        queue: Arc<MemoryJobQueue>,
        service: TeamServiceImpl,
    }

    async fn fixture() -> Fixture {
        fixture_with(|events| {
            events.expect_revoke().return_const(());
            events.expect_close_rooms().return_const(());
        })
        .await
    }

    async fn fixture_with(expect: impl FnOnce(&mut MockEventBroadcaster)) -> Fixture {
        let repos = memory::repositories();
        for (id, name) in [(1, "owner"), (2, "admin"), (3, "member"), (4, "outsider")] {
            repos
                .users
                .create(&User::new(id, name.into(), format!("{}@example.com", name), "x".into()))
                .await
                .unwrap();
        }

        let ids = Arc::new(SnowflakeGenerator::default());
        let queue = Arc::new(MemoryJobQueue::new());
        let mut events = MockEventBroadcaster::new();
        events.expect_publish().return_const(());
        events
            .expect_online_users()
            .returning(|ids| ids.iter().copied().filter(|id| *id == 1).collect());
        expect(&mut events);
        let events: Arc<dyn EventBroadcaster> = Arc::new(events);
        let notifications = Arc::new(NotificationServiceImpl::new(
            repos.clone(),
            ids.clone(),
            queue.clone(),
            events.clone(),
            3,
        ));
        let service = TeamServiceImpl::new(
            repos.clone(),
            ids.clone(),
            events,
            notifications,
            ActivityRecorder::new(repos.activities.clone(), ids),
        );

        Fixture {
            repos,
            queue,
            service,
        }
    }

    fn create_request(name: &str) -> CreateTeamRequest {
        CreateTeamRequest {
            name: name.into(),
            description: None,
        }
    }

    fn add_request(user_id: i64, role: TeamRole) -> AddTeamMemberRequest {
        AddTeamMemberRequest {
            user_id: user_id.to_string(),
            role: Some(role),
        }
    }

    async fn team_with_members(f: &Fixture) -> Team {
        let team = f.service.create(1, create_request("  Core  ")).await.unwrap();
        f.service.add_member(1, team.id, add_request(2, TeamRole::Admin)).await.unwrap();
        f.service.add_member(1, team.id, add_request(3, TeamRole::Member)).await.unwrap();
        team
    }

    // ==========================================================================
    // Lifecycle
    // ==========================================================================

    #[tokio::test]
    async fn test_create_makes_creator_owner() {
        let f = fixture().await;
        let team = f.service.create(1, create_request("  Core  ")).await.unwrap();
        assert_eq!(team.name, "Core");
        assert_eq!(team.role_of(1), Some(TeamRole::Owner));
        assert_eq!(f.service.list_mine(1).await.unwrap().len(), 1);
        assert!(f.service.list_mine(4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_team_name_rejected() {
        let f = fixture().await;
        let result = f.service.create(1, create_request(" \t ")).await;
        assert!(matches!(result, Err(TeamError::Repository(AppError::Validation { .. }))));
        assert!(f.service.list_mine(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_only_owner_deletes_and_deleted_team_is_gone() {
        let f = fixture().await;
        let team = team_with_members(&f).await;

        let result = f.service.delete(2, team.id).await;
        assert!(matches!(result, Err(TeamError::Policy(PolicyError::Forbidden(_)))));

        f.service.delete(1, team.id).await.unwrap();
        let result = f.service.get(1, team.id).await;
        assert!(matches!(result, Err(TeamError::Access(AccessError::NotFound("Team")))));
    }

    #[tokio::test]
    async fn test_outsider_cannot_view() {
        let f = fixture().await;
        let team = team_with_members(&f).await;
        let result = f.service.get(4, team.id).await;
        assert!(matches!(result, Err(TeamError::Access(AccessError::Forbidden(_)))));
    }

    // ==========================================================================
    // Membership
    // ==========================================================================

    #[tokio::test]
    async fn test_add_member_notifies_and_rejects_duplicates() {
        let f = fixture().await;
        let team = team_with_members(&f).await;

        // Two adds, two notifications
        assert_eq!(f.queue.depth().await.unwrap().ready, 2);

        let result = f.service.add_member(1, team.id, add_request(3, TeamRole::Member)).await;
        assert!(matches!(result, Err(TeamError::AlreadyMember)));

        let result = f.service.add_member(1, team.id, add_request(999, TeamRole::Member)).await;
        assert!(matches!(result, Err(TeamError::UserNotFound)));

        let result = f.service.add_member(3, team.id, add_request(4, TeamRole::Member)).await;
        assert!(matches!(result, Err(TeamError::Policy(PolicyError::Forbidden(_)))));
    }

    #[tokio::test]
    async fn test_role_changes_follow_policy() {
        let f = fixture().await;
        let team = team_with_members(&f).await;

        let member = f.service.change_member_role(2, team.id, 3, TeamRole::Admin).await.unwrap();
        assert_eq!(member.role, TeamRole::Admin);

        let result = f.service.change_member_role(2, team.id, 1, TeamRole::Member).await;
        assert!(matches!(result, Err(TeamError::Policy(PolicyError::Invalid(_)))));

        let stored = f.repos.teams.find_by_id(team.id).await.unwrap().unwrap();
        assert_eq!(stored.role_of(3), Some(TeamRole::Admin));
    }

    #[tokio::test]
    async fn test_member_can_leave_but_owner_cannot() {
        let f = fixture().await;
        let team = team_with_members(&f).await;

        f.service.remove_member(3, team.id, 3).await.unwrap();
        assert!(!f.service.get(1, team.id).await.unwrap().is_member(3));

        let result = f.service.remove_member(1, team.id, 1).await;
        assert!(matches!(result, Err(TeamError::Policy(PolicyError::Invalid(_)))));

        let result = f.service.remove_member(1, team.id, 3).await;
        assert!(matches!(result, Err(TeamError::MemberNotFound)));
    }

    #[tokio::test]
    async fn test_presence_lists_online_members() {
        let f = fixture().await;
        let team = team_with_members(&f).await;
        assert_eq!(f.service.presence(3, team.id).await.unwrap(), vec![1]);
    }

    // ==========================================================================
    // Socket access
    // ==========================================================================

    #[tokio::test]
    async fn test_removed_member_loses_team_rooms() {
        let f = fixture_with(|events| {
            events
                .expect_revoke()
                .withf(|user_id, rooms| *user_id == 3 && matches!(rooms, [Room::Team(_)]))
                .times(1)
                .return_const(());
        })
        .await;
        let team = team_with_members(&f).await;
        f.service.remove_member(1, team.id, 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_deleted_team_closes_its_room() {
        let f = fixture_with(|events| {
            events.expect_close_rooms().times(1).return_const(());
        })
        .await;
        let team = team_with_members(&f).await;
        f.service.delete(1, team.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_demoted_admin_loses_projects_without_a_role() {
        let f = fixture_with(|events| {
            events
                .expect_revoke()
                .withf(|user_id, rooms| *user_id == 2 && rooms.to_vec() == vec![Room::Project(20)])
                .times(1)
                .return_const(());
        })
        .await;
        let team = team_with_members(&f).await;
        for (id, name) in [(10, "Kept"), (20, "Lost")] {
            f.repos
                .projects
                .create(&Project::new(id, team.id, name.into(), 1))
                .await
                .unwrap();
        }
        f.repos
            .projects
            .add_member(10, &ProjectMember::new(2, ProjectRole::Viewer))
            .await
            .unwrap();

        f.service.change_member_role(1, team.id, 2, TeamRole::Member).await.unwrap();
    }
}
