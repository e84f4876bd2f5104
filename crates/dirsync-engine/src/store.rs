//! Directory store contract.
//!
//! The engine depends only on these traits; production deployments back them
//! with a relational store, tests use [`crate::memory::InMemoryDirectory`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use dirsync_core::{AuthProviderId, GroupId, TeamId, UserId};

use crate::model::{
    AuthenticationProvider, Group, GroupPermission, Team, User, UserAuthentication, UserRole,
};

/// Result type alias using `StoreError`.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by a directory store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced record does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        resource: &'static str,
        id: String,
    },

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backend failure (connection, query, serialization).
    #[error("Storage error: {0}")]
    Backend(String),
}

/// Fields for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Team the user belongs to.
    pub team_id: TeamId,
    /// Email address, provider-supplied casing preserved.
    pub email: String,
    /// Display name.
    pub name: String,
    /// Avatar URL, if the IdP supplied one.
    pub avatar_url: Option<String>,
    /// Role within the team.
    pub role: UserRole,
}

/// Fields for creating a new authentication link.
#[derive(Debug, Clone)]
pub struct NewAuthentication {
    /// The local user being linked.
    pub user_id: UserId,
    /// The provider binding.
    pub authentication_provider_id: AuthProviderId,
    /// IdP-assigned subject identifier.
    pub provider_id: String,
    /// OAuth scopes granted at link time.
    pub scopes: Vec<String>,
}

/// Partial update of user attributes; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    /// New display name.
    pub name: Option<String>,
    /// New email address.
    pub email: Option<String>,
    /// New avatar URL.
    pub avatar_url: Option<String>,
}

impl UserPatch {
    /// True when the patch would change nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.avatar_url.is_none()
    }
}

/// An authentication row joined with its user.
#[derive(Debug, Clone)]
pub struct LinkedUser {
    /// The authentication link.
    pub authentication: UserAuthentication,
    /// The linked user.
    pub user: User,
}

/// Read side of the directory store.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Look up a team by ID.
    async fn find_team(&self, id: TeamId) -> StoreResult<Option<Team>>;

    /// Look up an authentication provider by ID.
    async fn find_auth_provider(
        &self,
        id: AuthProviderId,
    ) -> StoreResult<Option<AuthenticationProvider>>;

    /// List enabled authentication providers with the given provider name.
    async fn list_enabled_auth_providers(
        &self,
        name: &str,
    ) -> StoreResult<Vec<AuthenticationProvider>>;

    /// Look up a group by ID, scoped to a team.
    async fn find_group_by_id(&self, team_id: TeamId, id: GroupId) -> StoreResult<Option<Group>>;

    /// Look up a group by name, scoped to a team.
    async fn find_group_by_name(&self, team_id: TeamId, name: &str) -> StoreResult<Option<Group>>;

    /// Look up a user by email within a team, case-insensitively.
    async fn find_user_by_email(&self, team_id: TeamId, email: &str) -> StoreResult<Option<User>>;

    /// Every authentication for the provider, joined with its user and
    /// constrained to the given team.
    async fn list_authentications(
        &self,
        provider_id: AuthProviderId,
        team_id: TeamId,
    ) -> StoreResult<Vec<LinkedUser>>;

    /// Open a scoped transaction.
    ///
    /// Dropping the transaction without committing rolls it back; this is
    /// what guarantees atomic release on all exit paths.
    async fn begin(&self) -> StoreResult<Box<dyn DirectoryTxn + '_>>;
}

/// Write side of the directory store, scoped to one transaction.
///
/// All mutations become visible atomically on [`DirectoryTxn::commit`].
#[async_trait]
pub trait DirectoryTxn: Send {
    /// Apply a partial attribute update to a user.
    async fn update_user(&mut self, id: UserId, patch: UserPatch) -> StoreResult<()>;

    /// Mark a user suspended. `actor` is `None` for system actions.
    async fn suspend_user(
        &mut self,
        id: UserId,
        at: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> StoreResult<()>;

    /// Clear a user's suspension state (both timestamp and actor).
    async fn clear_suspension(&mut self, id: UserId) -> StoreResult<()>;

    /// Create a user. `last_active_at` starts unset.
    async fn create_user(&mut self, user: NewUser) -> StoreResult<User>;

    /// Create an authentication link.
    async fn create_authentication(
        &mut self,
        auth: NewAuthentication,
    ) -> StoreResult<UserAuthentication>;

    /// Add a user to a group.
    async fn create_group_membership(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
        permission: GroupPermission,
    ) -> StoreResult<()>;

    /// Commit the transaction, making all buffered mutations visible.
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
