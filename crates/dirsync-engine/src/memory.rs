//! In-memory directory store.
//!
//! Backs the [`DirectoryStore`] contract with plain maps behind a mutex.
//! Used by the test suites and by embedders that do not need persistence.
//! Transactions buffer their mutations and apply them atomically on commit;
//! a dropped transaction discards them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use dirsync_core::{AuthProviderId, GroupId, TeamId, UserId};

use crate::model::{
    AuthenticationProvider, Group, GroupMembership, GroupPermission, Team, User,
    UserAuthentication,
};
use crate::store::{
    DirectoryStore, DirectoryTxn, LinkedUser, NewAuthentication, NewUser, StoreError, StoreResult,
    UserPatch,
};

#[derive(Debug, Default)]
struct DirectoryState {
    teams: HashMap<TeamId, Team>,
    providers: HashMap<AuthProviderId, AuthenticationProvider>,
    users: HashMap<UserId, User>,
    authentications: Vec<UserAuthentication>,
    groups: HashMap<GroupId, Group>,
    memberships: Vec<GroupMembership>,
}

/// In-memory implementation of the directory store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Insert a team record directly, bypassing transactions.
    pub fn seed_team(&self, team: Team) {
        self.lock().teams.insert(team.id, team);
    }

    /// Insert a provider record directly, bypassing transactions.
    pub fn seed_provider(&self, provider: AuthenticationProvider) {
        self.lock().providers.insert(provider.id, provider);
    }

    /// Insert a user record directly, bypassing transactions.
    pub fn seed_user(&self, user: User) {
        self.lock().users.insert(user.id, user);
    }

    /// Insert an authentication record directly, bypassing transactions.
    pub fn seed_authentication(&self, auth: UserAuthentication) {
        self.lock().authentications.push(auth);
    }

    /// Insert a group record directly, bypassing transactions.
    pub fn seed_group(&self, group: Group) {
        self.lock().groups.insert(group.id, group);
    }

    /// Fetch a user by ID.
    #[must_use]
    pub fn user(&self, id: UserId) -> Option<User> {
        self.lock().users.get(&id).cloned()
    }

    /// All users in a team.
    #[must_use]
    pub fn users_in_team(&self, team_id: TeamId) -> Vec<User> {
        self.lock()
            .users
            .values()
            .filter(|u| u.team_id == team_id)
            .cloned()
            .collect()
    }

    /// All authentication records.
    #[must_use]
    pub fn authentications(&self) -> Vec<UserAuthentication> {
        self.lock().authentications.clone()
    }

    /// All group memberships.
    #[must_use]
    pub fn memberships(&self) -> Vec<GroupMembership> {
        self.lock().memberships.clone()
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectory {
    async fn find_team(&self, id: TeamId) -> StoreResult<Option<Team>> {
        Ok(self.lock().teams.get(&id).cloned())
    }

    async fn find_auth_provider(
        &self,
        id: AuthProviderId,
    ) -> StoreResult<Option<AuthenticationProvider>> {
        Ok(self.lock().providers.get(&id).cloned())
    }

    async fn list_enabled_auth_providers(
        &self,
        name: &str,
    ) -> StoreResult<Vec<AuthenticationProvider>> {
        Ok(self
            .lock()
            .providers
            .values()
            .filter(|p| p.enabled && p.name == name)
            .cloned()
            .collect())
    }

    async fn find_group_by_id(&self, team_id: TeamId, id: GroupId) -> StoreResult<Option<Group>> {
        Ok(self
            .lock()
            .groups
            .get(&id)
            .filter(|g| g.team_id == team_id)
            .cloned())
    }

    async fn find_group_by_name(&self, team_id: TeamId, name: &str) -> StoreResult<Option<Group>> {
        Ok(self
            .lock()
            .groups
            .values()
            .find(|g| g.team_id == team_id && g.name == name)
            .cloned())
    }

    async fn find_user_by_email(&self, team_id: TeamId, email: &str) -> StoreResult<Option<User>> {
        let needle = email.to_lowercase();
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.team_id == team_id && u.email.to_lowercase() == needle)
            .cloned())
    }

    async fn list_authentications(
        &self,
        provider_id: AuthProviderId,
        team_id: TeamId,
    ) -> StoreResult<Vec<LinkedUser>> {
        let state = self.lock();
        let mut linked = Vec::new();
        for auth in &state.authentications {
            if auth.authentication_provider_id != provider_id {
                continue;
            }
            if let Some(user) = state.users.get(&auth.user_id) {
                if user.team_id == team_id {
                    linked.push(LinkedUser {
                        authentication: auth.clone(),
                        user: user.clone(),
                    });
                }
            }
        }
        Ok(linked)
    }

    async fn begin(&self) -> StoreResult<Box<dyn DirectoryTxn + '_>> {
        Ok(Box::new(MemoryTxn {
            state: Arc::clone(&self.state),
            ops: Vec::new(),
        }))
    }
}

/// Buffered mutation applied at commit time.
#[derive(Debug)]
enum Op {
    UpdateUser { id: UserId, patch: UserPatch },
    SuspendUser {
        id: UserId,
        at: DateTime<Utc>,
        actor: Option<UserId>,
    },
    ClearSuspension { id: UserId },
    InsertUser(User),
    InsertAuthentication(UserAuthentication),
    InsertMembership(GroupMembership),
}

/// Transaction over the in-memory store.
///
/// Mutations are buffered; `commit` validates and applies them under one
/// lock acquisition so the whole transaction lands or nothing does.
#[derive(Debug)]
struct MemoryTxn {
    state: Arc<Mutex<DirectoryState>>,
    ops: Vec<Op>,
}

impl MemoryTxn {
    fn validate(state: &DirectoryState, ops: &[Op]) -> StoreResult<()> {
        // Records inserted earlier in this transaction are visible to later
        // validation steps.
        let mut pending_users: HashMap<UserId, String> = HashMap::new();
        let mut pending_auths: Vec<(AuthProviderId, String)> = Vec::new();
        let mut pending_user_auths: Vec<(UserId, AuthProviderId)> = Vec::new();

        let user_exists = |state: &DirectoryState,
                           pending: &HashMap<UserId, String>,
                           id: UserId| {
            state.users.contains_key(&id) || pending.contains_key(&id)
        };

        for op in ops {
            match op {
                Op::UpdateUser { id, patch } => {
                    let user = state.users.get(id).ok_or(StoreError::NotFound {
                        resource: "User",
                        id: id.to_string(),
                    })?;
                    if let Some(ref email) = patch.email {
                        let needle = email.to_lowercase();
                        let taken = state.users.values().any(|u| {
                            u.id != *id
                                && u.team_id == user.team_id
                                && u.email.to_lowercase() == needle
                        });
                        if taken {
                            return Err(StoreError::Conflict(format!(
                                "email {email} already in use"
                            )));
                        }
                    }
                }
                Op::SuspendUser { id, .. } | Op::ClearSuspension { id } => {
                    if !state.users.contains_key(id) {
                        return Err(StoreError::NotFound {
                            resource: "User",
                            id: id.to_string(),
                        });
                    }
                }
                Op::InsertUser(user) => {
                    let needle = user.email.to_lowercase();
                    let taken = state
                        .users
                        .values()
                        .any(|u| u.team_id == user.team_id && u.email.to_lowercase() == needle)
                        || pending_users.values().any(|e| *e == needle);
                    if taken {
                        return Err(StoreError::Conflict(format!(
                            "email {} already in use",
                            user.email
                        )));
                    }
                    pending_users.insert(user.id, needle);
                }
                Op::InsertAuthentication(auth) => {
                    if !user_exists(state, &pending_users, auth.user_id) {
                        return Err(StoreError::NotFound {
                            resource: "User",
                            id: auth.user_id.to_string(),
                        });
                    }
                    let key = (auth.authentication_provider_id, auth.provider_id.clone());
                    let taken = state.authentications.iter().any(|a| {
                        a.authentication_provider_id == key.0 && a.provider_id == key.1
                    }) || pending_auths.contains(&key);
                    if taken {
                        return Err(StoreError::Conflict(format!(
                            "authentication for subject {} already exists",
                            auth.provider_id
                        )));
                    }
                    // A user holds at most one authentication per provider.
                    let user_key = (auth.user_id, auth.authentication_provider_id);
                    let user_taken = state.authentications.iter().any(|a| {
                        a.user_id == user_key.0 && a.authentication_provider_id == user_key.1
                    }) || pending_user_auths.contains(&user_key);
                    if user_taken {
                        return Err(StoreError::Conflict(format!(
                            "user {} already has an authentication for this provider",
                            auth.user_id
                        )));
                    }
                    pending_auths.push(key);
                    pending_user_auths.push(user_key);
                }
                Op::InsertMembership(membership) => {
                    if !state.groups.contains_key(&membership.group_id) {
                        return Err(StoreError::NotFound {
                            resource: "Group",
                            id: membership.group_id.to_string(),
                        });
                    }
                    if !user_exists(state, &pending_users, membership.user_id) {
                        return Err(StoreError::NotFound {
                            resource: "User",
                            id: membership.user_id.to_string(),
                        });
                    }
                    let dup = state.memberships.iter().any(|m| {
                        m.group_id == membership.group_id && m.user_id == membership.user_id
                    });
                    if dup {
                        return Err(StoreError::Conflict(format!(
                            "user {} already in group {}",
                            membership.user_id, membership.group_id
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    fn apply(state: &mut DirectoryState, ops: Vec<Op>) {
        let now = Utc::now();
        for op in ops {
            match op {
                Op::UpdateUser { id, patch } => {
                    if let Some(user) = state.users.get_mut(&id) {
                        if let Some(name) = patch.name {
                            user.name = name;
                        }
                        if let Some(email) = patch.email {
                            user.email = email;
                        }
                        if let Some(avatar_url) = patch.avatar_url {
                            user.avatar_url = Some(avatar_url);
                        }
                        user.updated_at = now;
                    }
                }
                Op::SuspendUser { id, at, actor } => {
                    if let Some(user) = state.users.get_mut(&id) {
                        user.suspended_at = Some(at);
                        user.suspended_by_id = actor;
                        user.updated_at = now;
                    }
                }
                Op::ClearSuspension { id } => {
                    if let Some(user) = state.users.get_mut(&id) {
                        user.suspended_at = None;
                        user.suspended_by_id = None;
                        user.updated_at = now;
                    }
                }
                Op::InsertUser(user) => {
                    state.users.insert(user.id, user);
                }
                Op::InsertAuthentication(auth) => {
                    state.authentications.push(auth);
                }
                Op::InsertMembership(membership) => {
                    state.memberships.push(membership);
                }
            }
        }
    }
}

#[async_trait]
impl DirectoryTxn for MemoryTxn {
    async fn update_user(&mut self, id: UserId, patch: UserPatch) -> StoreResult<()> {
        self.ops.push(Op::UpdateUser { id, patch });
        Ok(())
    }

    async fn suspend_user(
        &mut self,
        id: UserId,
        at: DateTime<Utc>,
        actor: Option<UserId>,
    ) -> StoreResult<()> {
        self.ops.push(Op::SuspendUser { id, at, actor });
        Ok(())
    }

    async fn clear_suspension(&mut self, id: UserId) -> StoreResult<()> {
        self.ops.push(Op::ClearSuspension { id });
        Ok(())
    }

    async fn create_user(&mut self, user: NewUser) -> StoreResult<User> {
        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            team_id: user.team_id,
            email: user.email,
            name: user.name,
            avatar_url: user.avatar_url,
            role: user.role,
            suspended_at: None,
            suspended_by_id: None,
            last_active_at: None,
            created_at: now,
            updated_at: now,
        };
        self.ops.push(Op::InsertUser(user.clone()));
        Ok(user)
    }

    async fn create_authentication(
        &mut self,
        auth: NewAuthentication,
    ) -> StoreResult<UserAuthentication> {
        let auth = UserAuthentication {
            id: Uuid::new_v4(),
            user_id: auth.user_id,
            authentication_provider_id: auth.authentication_provider_id,
            provider_id: auth.provider_id,
            scopes: auth.scopes,
            created_at: Utc::now(),
        };
        self.ops.push(Op::InsertAuthentication(auth.clone()));
        Ok(auth)
    }

    async fn create_group_membership(
        &mut self,
        group_id: GroupId,
        user_id: UserId,
        permission: GroupPermission,
    ) -> StoreResult<()> {
        self.ops.push(Op::InsertMembership(GroupMembership {
            group_id,
            user_id,
            permission,
            created_at: Utc::now(),
        }));
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        let ops = std::mem::take(&mut self.ops);
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Self::validate(&state, &ops)?;
        Self::apply(&mut state, ops);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserRole;

    fn team() -> Team {
        Team {
            id: TeamId::new(),
            name: "Acme".to_string(),
            default_user_role: None,
        }
    }

    fn new_user(team_id: TeamId, email: &str) -> NewUser {
        NewUser {
            team_id,
            email: email.to_string(),
            name: "Test User".to_string(),
            avatar_url: None,
            role: UserRole::Member,
        }
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_insensitive() {
        let store = InMemoryDirectory::new();
        let team = team();
        store.seed_team(team.clone());

        let mut txn = store.begin().await.unwrap();
        txn.create_user(new_user(team.id, "Mixed.Case@Example.com"))
            .await
            .unwrap();
        txn.commit().await.unwrap();

        let found = store
            .find_user_by_email(team.id, "mixed.case@example.COM")
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = InMemoryDirectory::new();
        let team = team();
        store.seed_team(team.clone());

        {
            let mut txn = store.begin().await.unwrap();
            txn.create_user(new_user(team.id, "ghost@example.com"))
                .await
                .unwrap();
            // No commit.
        }

        assert!(store
            .find_user_by_email(team.id, "ghost@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_authentication_conflicts() {
        let store = InMemoryDirectory::new();
        let team = team();
        let provider_id = AuthProviderId::new();
        store.seed_team(team.clone());

        let mut txn = store.begin().await.unwrap();
        let user = txn.create_user(new_user(team.id, "a@example.com")).await.unwrap();
        txn.create_authentication(NewAuthentication {
            user_id: user.id,
            authentication_provider_id: provider_id,
            provider_id: "subject-1".to_string(),
            scopes: vec![],
        })
        .await
        .unwrap();
        txn.commit().await.unwrap();

        let mut txn = store.begin().await.unwrap();
        let other = txn.create_user(new_user(team.id, "b@example.com")).await.unwrap();
        txn.create_authentication(NewAuthentication {
            user_id: other.id,
            authentication_provider_id: provider_id,
            provider_id: "subject-1".to_string(),
            scopes: vec![],
        })
        .await
        .unwrap();
        let err = txn.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        // The conflicting transaction applied nothing.
        assert!(store
            .find_user_by_email(team.id, "b@example.com")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_failed_commit_is_atomic() {
        let store = InMemoryDirectory::new();
        let team = team();
        store.seed_team(team.clone());

        let mut txn = store.begin().await.unwrap();
        let user = txn.create_user(new_user(team.id, "c@example.com")).await.unwrap();
        // Membership for a group that does not exist fails validation.
        txn.create_group_membership(GroupId::new(), user.id, GroupPermission::Member)
            .await
            .unwrap();
        let err = txn.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(store.users_in_team(team.id).is_empty());
    }
}
