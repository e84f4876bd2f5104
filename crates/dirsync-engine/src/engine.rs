//! Reconciliation engine.
//!
//! Applies the minimal set of mutations that brings one team's directory in
//! line with an IdP snapshot: create, link, update, suspend, reactivate.
//! Recoverable failures never escape [`ReconciliationEngine::reconcile`];
//! they accumulate in the returned [`SyncReport`].

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use dirsync_core::{AuthProviderId, GroupId, SyncReport, SyncUser, TeamId};

use crate::diff::diff_user;
use crate::model::{Group, GroupPermission, Team, User, UserRole};
use crate::store::{DirectoryStore, NewAuthentication, NewUser, StoreResult};

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Substrings identifying an IdP-sourced avatar URL; stored avatars
    /// matching none of these are treated as user-uploaded and preserved.
    #[serde(default = "default_avatar_source_hints")]
    pub avatar_source_hints: Vec<String>,
}

fn default_avatar_source_hints() -> Vec<String> {
    vec!["keycloak".to_string()]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            avatar_source_hints: default_avatar_source_hints(),
        }
    }
}

/// Per-run options, derived from the binding's settings.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Group newly created users are added to, by ID. Takes precedence over
    /// the name lookup.
    pub default_group_id: Option<GroupId>,
    /// Fallback group lookup by name.
    pub default_group_name: Option<String>,
}

/// Outcome of synchronizing one already-linked or newly-linked user.
#[derive(Debug, Clone, Copy, Default)]
struct UserOutcome {
    updated: bool,
    reactivated: bool,
}

/// The reconciliation engine.
pub struct ReconciliationEngine {
    store: Arc<dyn DirectoryStore>,
    config: EngineConfig,
}

impl ReconciliationEngine {
    /// Create an engine with default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn DirectoryStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Create an engine with custom configuration.
    #[must_use]
    pub fn with_config(store: Arc<dyn DirectoryStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Reconcile one binding against a snapshot.
    ///
    /// Phase 1 walks every existing authentication for the binding, updating
    /// or suspending its user. Phase 2 walks snapshot entries not seen in
    /// phase 1, linking them to existing users by email or creating new
    /// users. Each user is mutated in its own transaction; one user's
    /// failure is recorded and the run continues.
    #[instrument(skip(self, snapshot, options), fields(team_id = %team_id, provider_id = %auth_provider_id))]
    pub async fn reconcile(
        &self,
        team_id: TeamId,
        auth_provider_id: AuthProviderId,
        snapshot: &[SyncUser],
        options: &SyncOptions,
    ) -> SyncReport {
        let mut report = SyncReport::new();

        // An empty snapshot would suspend every linked user in the team.
        // Treat it as a failed fetch rather than a directive.
        if snapshot.is_empty() {
            report.errors.push(
                "Provider returned empty user list - sync aborted to prevent mass suspension"
                    .to_string(),
            );
            return report;
        }

        let team = match self.store.find_team(team_id).await {
            Ok(Some(team)) => team,
            Ok(None) => {
                report.errors.push(format!("Team {team_id} not found"));
                return report;
            }
            Err(e) => {
                report
                    .errors
                    .push(format!("Failed to load team {team_id}: {e}"));
                return report;
            }
        };

        match self.store.find_auth_provider(auth_provider_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                report
                    .errors
                    .push(format!("Authentication provider {auth_provider_id} not found"));
                return report;
            }
            Err(e) => {
                report.errors.push(format!(
                    "Failed to load authentication provider {auth_provider_id}: {e}"
                ));
                return report;
            }
        }

        let by_provider_id: HashMap<&str, &SyncUser> = snapshot
            .iter()
            .map(|entry| (entry.provider_id.as_str(), entry))
            .collect();

        let default_group = self.resolve_default_group(team_id, options).await;

        // Phase 1: every user already linked to this binding.
        let linked = match self
            .store
            .list_authentications(auth_provider_id, team_id)
            .await
        {
            Ok(linked) => linked,
            Err(e) => {
                report.errors.push(format!(
                    "Failed to load authentications for provider {auth_provider_id}: {e}"
                ));
                return report;
            }
        };

        let mut processed: HashSet<String> = HashSet::with_capacity(linked.len());

        for link in &linked {
            let user = &link.user;
            processed.insert(link.authentication.provider_id.clone());

            if let Some(entry) = by_provider_id
                .get(link.authentication.provider_id.as_str())
                .copied()
            {
                match self.sync_linked_user(user, entry).await {
                    Ok(outcome) => {
                        if outcome.updated {
                            report.updated += 1;
                        } else {
                            report.unchanged += 1;
                        }
                        if outcome.reactivated {
                            report.reactivated += 1;
                        }
                    }
                    Err(e) => {
                        report
                            .errors
                            .push(format!("Failed to update user {}: {e}", user.email));
                    }
                }
            } else if user.is_suspended() {
                // Already suspended orphan; nothing to do.
                report.unchanged += 1;
            } else {
                match self.suspend_orphan(user).await {
                    Ok(()) => report.suspended += 1,
                    Err(e) => {
                        report
                            .errors
                            .push(format!("Failed to suspend user {}: {e}", user.email));
                    }
                }
            }
        }

        // Phase 2: snapshot entries without an existing authentication.
        for entry in snapshot {
            if !processed.insert(entry.provider_id.clone()) {
                continue;
            }

            // The normalizer filters these out already; kept as a guard for
            // callers that assemble snapshots themselves.
            if entry.email.is_empty() {
                report.errors.push(format!(
                    "Skipping user {}: no email address",
                    entry.provider_id
                ));
                continue;
            }

            let existing = match self.store.find_user_by_email(team_id, &entry.email).await {
                Ok(existing) => existing,
                Err(e) => {
                    report
                        .errors
                        .push(format!("Failed to update user {}: {e}", entry.email));
                    continue;
                }
            };

            match existing {
                Some(user) => match self.link_existing_user(&user, entry, auth_provider_id).await {
                    Ok(outcome) => {
                        if outcome.updated {
                            report.updated += 1;
                        }
                        if outcome.reactivated {
                            report.reactivated += 1;
                        }
                        if !outcome.updated && !outcome.reactivated {
                            report.unchanged += 1;
                        }
                    }
                    Err(e) => {
                        report
                            .errors
                            .push(format!("Failed to update user {}: {e}", user.email));
                    }
                },
                None => {
                    match self
                        .create_user(&team, entry, auth_provider_id, default_group.as_ref())
                        .await
                    {
                        Ok(added_to_group) => {
                            report.created += 1;
                            if added_to_group {
                                report.added_to_group += 1;
                            }
                        }
                        Err(e) => {
                            report
                                .errors
                                .push(format!("Failed to create user {}: {e}", entry.email));
                        }
                    }
                }
            }
        }

        debug!(
            created = report.created,
            updated = report.updated,
            suspended = report.suspended,
            reactivated = report.reactivated,
            unchanged = report.unchanged,
            errors = report.errors.len(),
            "Reconciliation finished"
        );

        report
    }

    /// Resolve the default group, ID first, then name. A configured but
    /// missing group is logged and ignored.
    async fn resolve_default_group(
        &self,
        team_id: TeamId,
        options: &SyncOptions,
    ) -> Option<Group> {
        if let Some(group_id) = options.default_group_id {
            match self.store.find_group_by_id(team_id, group_id).await {
                Ok(Some(group)) => return Some(group),
                Ok(None) => {
                    warn!(group_id = %group_id, "Configured default group not found, skipping group assignment");
                }
                Err(e) => {
                    warn!(group_id = %group_id, error = %e, "Failed to resolve default group");
                }
            }
        }

        if let Some(ref name) = options.default_group_name {
            match self.store.find_group_by_name(team_id, name).await {
                Ok(Some(group)) => return Some(group),
                Ok(None) => {
                    warn!(group = %name, "Configured default group not found, skipping group assignment");
                }
                Err(e) => {
                    warn!(group = %name, error = %e, "Failed to resolve default group");
                }
            }
        }

        None
    }

    /// Phase-1 match: apply the attribute diff and reactivate if suspended.
    async fn sync_linked_user(&self, user: &User, entry: &SyncUser) -> StoreResult<UserOutcome> {
        let diff = diff_user(user, entry, &self.config.avatar_source_hints);
        let outcome = UserOutcome {
            updated: diff.material,
            reactivated: user.is_suspended(),
        };

        if diff.patch.is_empty() && !outcome.reactivated {
            return Ok(outcome);
        }

        let mut txn = self.store.begin().await?;
        if !diff.patch.is_empty() {
            txn.update_user(user.id, diff.patch).await?;
        }
        if outcome.reactivated {
            txn.clear_suspension(user.id).await?;
        }
        txn.commit().await?;

        Ok(outcome)
    }

    /// Phase-1 orphan: the subject vanished from the snapshot.
    async fn suspend_orphan(&self, user: &User) -> StoreResult<()> {
        debug!(user_id = %user.id, "Suspending user absent from snapshot");
        let mut txn = self.store.begin().await?;
        // Suspension actor stays unset: this is a system action.
        txn.suspend_user(user.id, Utc::now(), None).await?;
        txn.commit().await
    }

    /// Phase-2 email hit: link an existing user (e.g. an invite) to the
    /// subject, applying the diff and reactivating in the same transaction.
    async fn link_existing_user(
        &self,
        user: &User,
        entry: &SyncUser,
        auth_provider_id: AuthProviderId,
    ) -> StoreResult<UserOutcome> {
        let diff = diff_user(user, entry, &self.config.avatar_source_hints);
        let outcome = UserOutcome {
            updated: diff.material,
            reactivated: user.is_suspended(),
        };

        let mut txn = self.store.begin().await?;
        txn.create_authentication(NewAuthentication {
            user_id: user.id,
            authentication_provider_id: auth_provider_id,
            provider_id: entry.provider_id.clone(),
            scopes: Vec::new(),
        })
        .await?;
        if !diff.patch.is_empty() {
            txn.update_user(user.id, diff.patch).await?;
        }
        if outcome.reactivated {
            txn.clear_suspension(user.id).await?;
        }
        txn.commit().await?;

        debug!(user_id = %user.id, provider_id = %entry.provider_id, "Linked existing user");
        Ok(outcome)
    }

    /// Phase-2 miss: create the user, its authentication, and the optional
    /// default-group membership in one transaction. Returns whether a group
    /// membership was created.
    async fn create_user(
        &self,
        team: &Team,
        entry: &SyncUser,
        auth_provider_id: AuthProviderId,
        default_group: Option<&Group>,
    ) -> StoreResult<bool> {
        let role = team.default_user_role.unwrap_or(UserRole::Member);

        let mut txn = self.store.begin().await?;
        let user = txn
            .create_user(NewUser {
                team_id: team.id,
                email: entry.email.clone(),
                name: entry.name.clone(),
                avatar_url: entry.avatar_url.clone(),
                role,
            })
            .await?;
        txn.create_authentication(NewAuthentication {
            user_id: user.id,
            authentication_provider_id: auth_provider_id,
            provider_id: entry.provider_id.clone(),
            scopes: Vec::new(),
        })
        .await?;

        let mut added_to_group = false;
        if let Some(group) = default_group {
            txn.create_group_membership(group.id, user.id, GroupPermission::Member)
                .await?;
            added_to_group = true;
        }

        txn.commit().await?;

        debug!(user_id = %user.id, provider_id = %entry.provider_id, "Created user from snapshot");
        Ok(added_to_group)
    }
}
