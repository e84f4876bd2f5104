//! Driver tick tests: partition filtering, skip-tick semantics, shared
//! snapshots, and per-binding fault isolation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use dirsync_core::{AuthProviderId, Snapshot, SyncUser, TeamId, UserId};
use dirsync_engine::{
    AuthenticationProvider, DirectoryStore, InMemoryDirectory, ProviderSettings, Team, User,
    UserAuthentication, UserRole,
};
use dirsync_scheduler::{Partition, SnapshotSource, SourceError, SyncDriver};

/// Snapshot source with canned behavior.
struct StubSource {
    connected: bool,
    snapshot: Option<Snapshot>,
}

impl StubSource {
    fn with_users(users: Vec<SyncUser>) -> Self {
        Self {
            connected: true,
            snapshot: Some(Snapshot {
                users,
                skipped: vec![],
            }),
        }
    }

    fn disconnected() -> Self {
        Self {
            connected: false,
            snapshot: None,
        }
    }

    fn failing_fetch() -> Self {
        Self {
            connected: true,
            snapshot: None,
        }
    }
}

#[async_trait]
impl SnapshotSource for StubSource {
    async fn test_connection(&self) -> bool {
        self.connected
    }

    async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError> {
        self.snapshot
            .clone()
            .ok_or_else(|| SourceError("fetch failed".to_string()))
    }
}

fn entry(provider_id: &str, email: &str, name: &str) -> SyncUser {
    SyncUser {
        provider_id: provider_id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        avatar_url: None,
    }
}

fn seed_binding(store: &InMemoryDirectory, provider_id: AuthProviderId) -> (Team, AuthenticationProvider) {
    let team = Team {
        id: TeamId::new(),
        name: "Acme".to_string(),
        default_user_role: None,
    };
    let provider = AuthenticationProvider {
        id: provider_id,
        team_id: team.id,
        name: "oidc".to_string(),
        enabled: true,
        settings: ProviderSettings::default(),
    };
    store.seed_team(team.clone());
    store.seed_provider(provider.clone());
    (team, provider)
}

fn seed_linked_user(
    store: &InMemoryDirectory,
    team: &Team,
    provider: &AuthenticationProvider,
    provider_id: &str,
    email: &str,
) -> User {
    let now = Utc::now();
    let user = User {
        id: UserId::new(),
        team_id: team.id,
        email: email.to_string(),
        name: "Existing".to_string(),
        avatar_url: None,
        role: UserRole::Member,
        suspended_at: None,
        suspended_by_id: None,
        last_active_at: None,
        created_at: now,
        updated_at: now,
    };
    store.seed_user(user.clone());
    store.seed_authentication(UserAuthentication {
        id: Uuid::new_v4(),
        user_id: user.id,
        authentication_provider_id: provider.id,
        provider_id: provider_id.to_string(),
        scopes: vec![],
        created_at: now,
    });
    user
}

#[tokio::test]
async fn test_tick_skipped_when_probe_fails() {
    let store = InMemoryDirectory::new();
    let (team, provider) = seed_binding(&store, AuthProviderId::new());
    let user = seed_linked_user(&store, &team, &provider, "g1", "a@example.com");

    let driver = SyncDriver::new(Arc::new(store.clone()), Partition::solo());
    let summary = driver.run_tick(&StubSource::disconnected()).await;

    assert!(summary.was_skipped());
    assert!(summary.reports.is_empty());
    // Nothing was suspended or mutated.
    assert!(store.user(user.id).unwrap().suspended_at.is_none());
}

#[tokio::test]
async fn test_tick_skipped_when_fetch_fails() {
    let store = InMemoryDirectory::new();
    seed_binding(&store, AuthProviderId::new());

    let driver = SyncDriver::new(Arc::new(store.clone()), Partition::solo());
    let summary = driver.run_tick(&StubSource::failing_fetch()).await;

    assert!(summary.was_skipped());
    assert!(summary.skipped_reason.unwrap().contains("snapshot fetch failed"));
}

#[tokio::test]
async fn test_all_bindings_see_the_same_snapshot() {
    let store = InMemoryDirectory::new();
    let (team_a, _) = seed_binding(&store, AuthProviderId::new());
    let (team_b, _) = seed_binding(&store, AuthProviderId::new());

    let driver = SyncDriver::new(Arc::new(store.clone()), Partition::solo());
    let source = StubSource::with_users(vec![entry("g1", "a@example.com", "A")]);
    let summary = driver.run_tick(&source).await;

    assert!(!summary.was_skipped());
    assert_eq!(summary.reports.len(), 2);
    for binding in &summary.reports {
        assert_eq!(binding.report.created, 1);
    }
    assert_eq!(store.users_in_team(team_a.id).len(), 1);
    assert_eq!(store.users_in_team(team_b.id).len(), 1);
}

#[tokio::test]
async fn test_partition_filters_bindings() {
    let store = InMemoryDirectory::new();
    let even = AuthProviderId::from_uuid(Uuid::from_u128(2));
    let odd = AuthProviderId::from_uuid(Uuid::from_u128(3));
    seed_binding(&store, even);
    seed_binding(&store, odd);

    let store: Arc<dyn DirectoryStore> = Arc::new(store);
    let first = SyncDriver::new(Arc::clone(&store), Partition::new(0, 2).unwrap());
    let second = SyncDriver::new(Arc::clone(&store), Partition::new(1, 2).unwrap());
    let source = StubSource::with_users(vec![entry("g1", "a@example.com", "A")]);

    let summary = first.run_tick(&source).await;
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].provider_id, even);

    let summary = second.run_tick(&source).await;
    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].provider_id, odd);
}

#[tokio::test]
async fn test_empty_partition_does_not_probe() {
    let store = InMemoryDirectory::new();
    // No bindings at all; a disconnected source must not cause a skip,
    // because the probe never runs.
    let driver = SyncDriver::new(Arc::new(store), Partition::solo());
    let summary = driver.run_tick(&StubSource::disconnected()).await;

    assert!(!summary.was_skipped());
    assert!(summary.reports.is_empty());
}

#[tokio::test]
async fn test_one_binding_failure_does_not_abort_others() {
    let store = InMemoryDirectory::new();

    // First binding points at a team that does not exist.
    let broken = AuthenticationProvider {
        id: AuthProviderId::new(),
        team_id: TeamId::new(),
        name: "oidc".to_string(),
        enabled: true,
        settings: ProviderSettings::default(),
    };
    store.seed_provider(broken.clone());

    let (healthy_team, _) = seed_binding(&store, AuthProviderId::new());

    let driver = SyncDriver::new(Arc::new(store.clone()), Partition::solo());
    let source = StubSource::with_users(vec![entry("g1", "a@example.com", "A")]);
    let summary = driver.run_tick(&source).await;

    assert_eq!(summary.reports.len(), 2);
    let broken_report = summary
        .reports
        .iter()
        .find(|b| b.provider_id == broken.id)
        .unwrap();
    assert_eq!(broken_report.report.errors.len(), 1);
    assert!(broken_report.report.errors[0].contains("not found"));

    let healthy_report = summary
        .reports
        .iter()
        .find(|b| b.provider_id != broken.id)
        .unwrap();
    assert_eq!(healthy_report.report.created, 1);
    assert_eq!(store.users_in_team(healthy_team.id).len(), 1);
}

#[tokio::test]
async fn test_disabled_and_foreign_providers_ignored() {
    let store = InMemoryDirectory::new();
    let (active_team, _) = seed_binding(&store, AuthProviderId::new());

    let disabled_team = Team {
        id: TeamId::new(),
        name: "Dormant".to_string(),
        default_user_role: None,
    };
    store.seed_team(disabled_team.clone());
    store.seed_provider(AuthenticationProvider {
        id: AuthProviderId::new(),
        team_id: disabled_team.id,
        name: "oidc".to_string(),
        enabled: false,
        settings: ProviderSettings::default(),
    });
    store.seed_provider(AuthenticationProvider {
        id: AuthProviderId::new(),
        team_id: disabled_team.id,
        name: "saml".to_string(),
        enabled: true,
        settings: ProviderSettings::default(),
    });

    let driver = SyncDriver::new(Arc::new(store.clone()), Partition::solo());
    let source = StubSource::with_users(vec![entry("g1", "a@example.com", "A")]);
    let summary = driver.run_tick(&source).await;

    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.reports[0].team_id, active_team.id);
    assert!(store.users_in_team(disabled_team.id).is_empty());
}

#[tokio::test]
async fn test_task_options_defaults() {
    let options = SyncDriver::task_options();
    assert_eq!(options.interval.as_secs(), 3600);
    assert_eq!(options.attempts, 2);
    assert_eq!(options.priority, dirsync_scheduler::TaskPriority::Background);
}
