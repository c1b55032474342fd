//! Team entity and repository trait.
//!
//! Maps to the `teams` and `team_members` tables in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Role of a user inside a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Owner,
    Admin,
    #[default]
    Member,
}

impl TeamRole {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "owner" => Self::Owner,
            "admin" => Self::Admin,
            _ => Self::Member,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Owners and admins may manage the team.
    pub fn can_manage(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

impl std::fmt::Display for TeamRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user's membership in a team.
///
/// Maps to the `team_members` table:
/// - team_id: BIGINT NOT NULL REFERENCES teams(id) (composite PK)
/// - user_id: BIGINT NOT NULL REFERENCES users(id) (composite PK)
/// - role: VARCHAR(16) NOT NULL
/// - joined_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: i64,
    pub role: TeamRole,
    pub joined_at: DateTime<Utc>,
}

impl TeamMember {
    pub fn new(user_id: i64, role: TeamRole) -> Self {
        Self {
            user_id,
            role,
            joined_at: Utc::now(),
        }
    }
}

/// Represents a team of users that owns projects.
///
/// Maps to the `teams` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - name: VARCHAR(100) NOT NULL
/// - description: TEXT NULL
/// - owner_id: BIGINT NOT NULL REFERENCES users(id)
/// - created_at / updated_at: TIMESTAMPTZ NOT NULL
/// - deleted_at: TIMESTAMPTZ NULL (soft delete)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: i64,

    /// Loaded from `team_members`; always contains the owner
    #[serde(default)]
    pub members: Vec<TeamMember>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Team {
    /// Create a new team whose only member is its owner.
    pub fn new(id: i64, name: String, description: Option<String>, owner_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            description,
            owner_id,
            members: vec![TeamMember {
                user_id: owner_id,
                role: TeamRole::Owner,
                joined_at: now,
            }],
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Find the membership of `user_id`.
    pub fn member(&self, user_id: i64) -> Option<&TeamMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    /// Role of `user_id`, if a member.
    pub fn role_of(&self, user_id: i64) -> Option<TeamRole> {
        self.member(user_id).map(|m| m.role)
    }

    pub fn is_member(&self, user_id: i64) -> bool {
        self.member(user_id).is_some()
    }

    pub fn member_ids(&self) -> Vec<i64> {
        self.members.iter().map(|m| m.user_id).collect()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Repository trait for Team data access operations.
///
/// Reads never return soft-deleted teams.
#[async_trait]
pub trait TeamRepository: Send + Sync {
    /// Create a team together with its member rows.
    async fn create(&self, team: &Team) -> Result<Team, AppError>;

    /// Find a live team with its members.
    async fn find_by_id(&self, id: i64) -> Result<Option<Team>, AppError>;

    /// Live teams `user_id` is a member of, oldest first.
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Team>, AppError>;

    /// Update name and description.
    async fn update(&self, team: &Team) -> Result<Team, AppError>;

    /// Mark the team deleted.
    async fn soft_delete(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Add a member. Conflicts if already a member.
    async fn add_member(&self, team_id: i64, member: &TeamMember) -> Result<(), AppError>;

    /// Change a member's role.
    async fn update_member_role(
        &self,
        team_id: i64,
        user_id: i64,
        role: TeamRole,
    ) -> Result<(), AppError>;

    /// Remove a member from the team and from every project of the team.
    async fn remove_member(&self, team_id: i64, user_id: i64) -> Result<(), AppError>;

    /// Physically delete teams soft-deleted before `before`, with everything they own.
    async fn purge_deleted(&self, before: DateTime<Utc>) -> Result<u64, AppError>;
}
