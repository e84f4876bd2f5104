//! Directory records the engine reads and writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use dirsync_core::{AuthProviderId, GroupId, TeamId, UserId};

/// Role assigned to a directory user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Full administrative access within the team.
    Admin,
    /// Regular member.
    Member,
    /// Read-only access.
    Viewer,
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Member => write!(f, "member"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            "viewer" => Ok(Self::Viewer),
            _ => Err(format!("Invalid user role: {s}")),
        }
    }
}

/// Permission a user holds within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupPermission {
    /// Regular group member.
    Member,
    /// Group administrator.
    Admin,
}

impl fmt::Display for GroupPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member => write!(f, "member"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// A team, the tenant boundary of the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Unique identifier.
    pub id: TeamId,
    /// Team name.
    pub name: String,
    /// Role given to users the engine creates; `Member` when unset.
    pub default_user_role: Option<UserRole>,
}

/// Per-binding sync settings stored on the provider row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Group newly created users are added to, by ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_default_group_id: Option<GroupId>,
    /// Fallback group lookup by name when no ID is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_default_group_name: Option<String>,
}

/// A (team, provider-name) authentication binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationProvider {
    /// Unique identifier.
    pub id: AuthProviderId,
    /// Team this binding belongs to.
    pub team_id: TeamId,
    /// Provider name, e.g. `"oidc"`.
    pub name: String,
    /// Whether the binding participates in sync.
    pub enabled: bool,
    /// Optional sync settings.
    pub settings: ProviderSettings,
}

/// A local directory user, scoped to a team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique identifier.
    pub id: UserId,
    /// Team this user belongs to.
    pub team_id: TeamId,
    /// Email address, unique case-insensitively within the team.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Avatar URL, if set.
    pub avatar_url: Option<String>,
    /// Role within the team.
    pub role: UserRole,
    /// When the user was suspended; `None` means active.
    pub suspended_at: Option<DateTime<Utc>>,
    /// Who suspended the user; `None` for system actions.
    pub suspended_by_id: Option<UserId>,
    /// Last recorded activity.
    pub last_active_at: Option<DateTime<Utc>>,
    /// Record creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the user is currently suspended.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended_at.is_some()
    }
}

/// Links a user to an authentication provider by external subject ID.
///
/// Unique within (provider, `provider_id`); created on first observation and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAuthentication {
    /// Unique identifier.
    pub id: Uuid,
    /// The linked local user.
    pub user_id: UserId,
    /// The provider binding this link belongs to.
    pub authentication_provider_id: AuthProviderId,
    /// IdP-assigned stable subject identifier.
    pub provider_id: String,
    /// OAuth scopes granted at link time.
    pub scopes: Vec<String>,
    /// Record creation time.
    pub created_at: DateTime<Utc>,
}

/// A group within a team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// Unique identifier.
    pub id: GroupId,
    /// Team this group belongs to.
    pub team_id: TeamId,
    /// Group name.
    pub name: String,
}

/// A user's membership in a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMembership {
    /// The group.
    pub group_id: GroupId,
    /// The member.
    pub user_id: UserId,
    /// Permission within the group.
    pub permission: GroupPermission,
    /// Record creation time.
    pub created_at: DateTime<Utc>,
}
