//! Authorization rules for teams, projects and their content.
//!
//! Every function is pure: callers load the entities, the policy decides.

use crate::domain::entities::{Attachment, Comment, Project, ProjectRole, Team, TeamRole};

/// Effective access to a project. Ordered by privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    Viewer,
    Contributor,
    Manager,
}

impl From<ProjectRole> for AccessLevel {
    fn from(role: ProjectRole) -> Self {
        match role {
            ProjectRole::Viewer => Self::Viewer,
            ProjectRole::Contributor => Self::Contributor,
            ProjectRole::Manager => Self::Manager,
        }
    }
}

/// Why a membership change was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// The actor lacks the privilege
    #[error("{0}")]
    Forbidden(&'static str),

    /// The change itself is not allowed for anyone
    #[error("{0}")]
    Invalid(&'static str),
}

/// Domain service for access decisions.
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn can_view_team(team: &Team, user_id: i64) -> bool {
        team.is_member(user_id)
    }

    /// Update the team and manage its members.
    pub fn can_manage_team(team: &Team, user_id: i64) -> bool {
        team.role_of(user_id).map(|r| r.can_manage()).unwrap_or(false)
    }

    pub fn can_delete_team(team: &Team, user_id: i64) -> bool {
        team.owner_id == user_id
    }

    /// Add a new member with `role`.
    pub fn check_add_team_member(
        team: &Team,
        actor_id: i64,
        role: TeamRole,
    ) -> Result<(), PolicyError> {
        if !Self::can_manage_team(team, actor_id) {
            return Err(PolicyError::Forbidden("Only team owners and admins can add members"));
        }
        if role == TeamRole::Owner {
            return Err(PolicyError::Invalid("A team has exactly one owner"));
        }
        Ok(())
    }

    /// Change the role of `target_id` to `role`.
    pub fn check_change_team_role(
        team: &Team,
        actor_id: i64,
        target_id: i64,
        role: TeamRole,
    ) -> Result<(), PolicyError> {
        let actor_role = team
            .role_of(actor_id)
            .filter(|r| r.can_manage())
            .ok_or(PolicyError::Forbidden("Only team owners and admins can change roles"))?;
        if target_id == team.owner_id {
            return Err(PolicyError::Invalid("The team owner cannot be demoted"));
        }
        if role == TeamRole::Owner {
            return Err(PolicyError::Invalid("A team has exactly one owner"));
        }
        if actor_role == TeamRole::Admin && team.role_of(target_id) == Some(TeamRole::Admin) {
            return Err(PolicyError::Forbidden("Only the owner can change an admin's role"));
        }
        Ok(())
    }

    /// Remove `target_id`; members may always remove themselves except the owner.
    pub fn check_remove_team_member(
        team: &Team,
        actor_id: i64,
        target_id: i64,
    ) -> Result<(), PolicyError> {
        if target_id == team.owner_id {
            return Err(PolicyError::Invalid("The team owner cannot be removed"));
        }
        if actor_id == target_id {
            return Ok(());
        }
        let actor_role = team
            .role_of(actor_id)
            .filter(|r| r.can_manage())
            .ok_or(PolicyError::Forbidden("Only team owners and admins can remove members"))?;
        if actor_role == TeamRole::Admin && team.role_of(target_id) == Some(TeamRole::Admin) {
            return Err(PolicyError::Forbidden("Only the owner can remove an admin"));
        }
        Ok(())
    }

    /// Effective access of `user_id` to `project`.
    ///
    /// The higher of the explicit project role and the team-derived level, where
    /// team owners and admins manage every project of the team. Plain team members
    /// need an explicit project role. Non-members of the team have no access.
    pub fn project_access(team: &Team, project: &Project, user_id: i64) -> Option<AccessLevel> {
        let team_role = team.role_of(user_id)?;
        let from_team = team_role.can_manage().then_some(AccessLevel::Manager);
        let from_project = project.role_of(user_id).map(AccessLevel::from);
        from_team.max(from_project)
    }

    pub fn can_edit_comment(comment: &Comment, user_id: i64) -> bool {
        comment.author_id == user_id
    }

    pub fn can_delete_comment(comment: &Comment, user_id: i64, level: AccessLevel) -> bool {
        comment.author_id == user_id || level >= AccessLevel::Manager
    }

    pub fn can_delete_attachment(attachment: &Attachment, user_id: i64, level: AccessLevel) -> bool {
        attachment.uploaded_by == user_id || level >= AccessLevel::Manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{ProjectMember, TeamMember};
    use chrono::Utc;
    use test_case::test_case;

    const OWNER: i64 = 1;
    const ADMIN: i64 = 2;
    const MEMBER: i64 = 3;
    const OTHER_ADMIN: i64 = 4;
    const OUTSIDER: i64 = 99;

    fn team() -> Team {
        let mut team = Team::new(10, "Core".into(), None, OWNER);
        team.members.push(TeamMember::new(ADMIN, TeamRole::Admin));
        team.members.push(TeamMember::new(MEMBER, TeamRole::Member));
        team.members.push(TeamMember::new(OTHER_ADMIN, TeamRole::Admin));
        team
    }

    fn project() -> Project {
        // Created by the plain member, who becomes manager
        Project::new(20, 10, "Roadmap".into(), MEMBER)
    }

    // ==========================================================================
    // Team Rules
    // ==========================================================================

    #[test]
    fn test_team_visibility_and_management() {
        let team = team();
        assert!(AccessPolicy::can_view_team(&team, MEMBER));
        assert!(!AccessPolicy::can_view_team(&team, OUTSIDER));
        assert!(AccessPolicy::can_manage_team(&team, OWNER));
        assert!(AccessPolicy::can_manage_team(&team, ADMIN));
        assert!(!AccessPolicy::can_manage_team(&team, MEMBER));
        assert!(AccessPolicy::can_delete_team(&team, OWNER));
        assert!(!AccessPolicy::can_delete_team(&team, ADMIN));
    }

    #[test]
    fn test_add_member_rules() {
        let team = team();
        assert!(AccessPolicy::check_add_team_member(&team, ADMIN, TeamRole::Member).is_ok());
        assert!(matches!(
            AccessPolicy::check_add_team_member(&team, MEMBER, TeamRole::Member),
            Err(PolicyError::Forbidden(_))
        ));
        assert!(matches!(
            AccessPolicy::check_add_team_member(&team, OWNER, TeamRole::Owner),
            Err(PolicyError::Invalid(_))
        ));
    }

    #[test_case(OWNER, ADMIN, TeamRole::Member, true ; "owner demotes admin")]
    #[test_case(ADMIN, MEMBER, TeamRole::Admin, true ; "admin promotes member")]
    #[test_case(ADMIN, OTHER_ADMIN, TeamRole::Member, false ; "admin cannot demote admin")]
    #[test_case(ADMIN, OWNER, TeamRole::Member, false ; "nobody demotes owner")]
    #[test_case(MEMBER, ADMIN, TeamRole::Member, false ; "member cannot change roles")]
    #[test_case(OWNER, MEMBER, TeamRole::Owner, false ; "ownership not assignable")]
    fn test_change_role_rules(actor: i64, target: i64, role: TeamRole, allowed: bool) {
        assert_eq!(
            AccessPolicy::check_change_team_role(&team(), actor, target, role).is_ok(),
            allowed
        );
    }

    #[test_case(MEMBER, MEMBER, true ; "member leaves")]
    #[test_case(ADMIN, MEMBER, true ; "admin removes member")]
    #[test_case(ADMIN, OTHER_ADMIN, false ; "admin cannot remove admin")]
    #[test_case(OWNER, ADMIN, true ; "owner removes admin")]
    #[test_case(OWNER, OWNER, false ; "owner cannot leave")]
    #[test_case(ADMIN, OWNER, false ; "owner cannot be removed")]
    #[test_case(MEMBER, ADMIN, false ; "member cannot remove others")]
    fn test_remove_member_rules(actor: i64, target: i64, allowed: bool) {
        assert_eq!(
            AccessPolicy::check_remove_team_member(&team(), actor, target).is_ok(),
            allowed
        );
    }

    // ==========================================================================
    // Project Access
    // ==========================================================================

    #[test]
    fn test_project_access_levels() {
        let team = team();
        let mut project = project();
        project.members.push(ProjectMember {
            user_id: ADMIN,
            role: ProjectRole::Viewer,
            added_at: Utc::now(),
        });

        assert_eq!(AccessPolicy::project_access(&team, &project, OWNER), Some(AccessLevel::Manager));
        // Team admin outranks a viewer project role
        assert_eq!(AccessPolicy::project_access(&team, &project, ADMIN), Some(AccessLevel::Manager));
        assert_eq!(AccessPolicy::project_access(&team, &project, MEMBER), Some(AccessLevel::Manager));
        assert_eq!(AccessPolicy::project_access(&team, &project, OUTSIDER), None);
    }

    #[test]
    fn test_plain_team_member_needs_project_role() {
        let mut team = team();
        team.members.push(TeamMember::new(5, TeamRole::Member));
        let mut project = project();
        assert_eq!(AccessPolicy::project_access(&team, &project, 5), None);

        project.members.push(ProjectMember::new(5, ProjectRole::Contributor));
        assert_eq!(
            AccessPolicy::project_access(&team, &project, 5),
            Some(AccessLevel::Contributor)
        );
    }

    #[test]
    fn test_project_role_without_team_membership_grants_nothing() {
        let team = team();
        let mut project = project();
        project.members.push(ProjectMember::new(OUTSIDER, ProjectRole::Manager));
        assert_eq!(AccessPolicy::project_access(&team, &project, OUTSIDER), None);
    }

    // ==========================================================================
    // Comment and Attachment Rules
    // ==========================================================================

    #[test]
    fn test_comment_rules() {
        let comment = Comment::new(1, 2, MEMBER, "hi".into(), vec![]);
        assert!(AccessPolicy::can_edit_comment(&comment, MEMBER));
        assert!(!AccessPolicy::can_edit_comment(&comment, OWNER));
        assert!(AccessPolicy::can_delete_comment(&comment, MEMBER, AccessLevel::Viewer));
        assert!(AccessPolicy::can_delete_comment(&comment, OWNER, AccessLevel::Manager));
        assert!(!AccessPolicy::can_delete_comment(&comment, ADMIN, AccessLevel::Contributor));
    }

    #[test]
    fn test_attachment_rules() {
        let attachment = Attachment {
            id: 1,
            task_id: 2,
            uploaded_by: MEMBER,
            filename: "a.txt".into(),
            content_type: "text/plain".into(),
            size: 1,
            storage_key: "k".into(),
            checksum: String::new(),
            created_at: Utc::now(),
            deleted_at: None,
        };
        assert!(AccessPolicy::can_delete_attachment(&attachment, MEMBER, AccessLevel::Contributor));
        assert!(AccessPolicy::can_delete_attachment(&attachment, ADMIN, AccessLevel::Manager));
        assert!(!AccessPolicy::can_delete_attachment(&attachment, ADMIN, AccessLevel::Contributor));
    }
}
