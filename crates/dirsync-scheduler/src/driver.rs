//! Per-tick sync driver.
//!
//! Runs on a fixed interval under the host's task runner. Each tick selects
//! the enabled OIDC bindings this replica owns, probes the IdP once, fetches
//! one snapshot, and reconciles every owned binding against that same
//! snapshot. A binding's failure surfaces in its report and never aborts the
//! remaining bindings.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use dirsync_core::{AuthProviderId, SyncReport, TeamId};
use dirsync_engine::{
    AuthenticationProvider, DirectoryStore, EngineConfig, ReconciliationEngine, SyncOptions,
};

use crate::partition::Partition;
use crate::source::SnapshotSource;

/// Provider name selected for sync.
pub const PROVIDER_NAME: &str = "oidc";

/// How many error strings from one report are logged verbatim.
const MAX_LOGGED_ERRORS: usize = 10;

/// Priority hint handed to the host's task runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPriority {
    /// Run when nothing more urgent is queued.
    Background,
    /// Regular priority.
    Normal,
    /// Ahead of regular work.
    High,
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Background => write!(f, "background"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Scheduling parameters for the sync task.
#[derive(Debug, Clone)]
pub struct TaskOptions {
    /// Interval between ticks.
    pub interval: Duration,
    /// Delivery attempts per run.
    pub attempts: u32,
    /// Scheduling priority.
    pub priority: TaskPriority,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            attempts: 2,
            priority: TaskPriority::Background,
        }
    }
}

/// Result of reconciling one binding during a tick.
#[derive(Debug)]
pub struct BindingReport {
    /// The binding.
    pub provider_id: AuthProviderId,
    /// Its team.
    pub team_id: TeamId,
    /// What the engine did.
    pub report: SyncReport,
}

/// Outcome of one tick.
#[derive(Debug, Default)]
pub struct TickSummary {
    /// Per-binding reports, in processing order.
    pub reports: Vec<BindingReport>,
    /// Set when the whole tick was abandoned before reconciling.
    pub skipped_reason: Option<String>,
}

impl TickSummary {
    fn skipped(reason: String) -> Self {
        Self {
            reports: Vec::new(),
            skipped_reason: Some(reason),
        }
    }

    /// True when the tick was abandoned before any binding was reconciled.
    #[must_use]
    pub fn was_skipped(&self) -> bool {
        self.skipped_reason.is_some()
    }
}

/// The periodic sync driver.
pub struct SyncDriver {
    store: Arc<dyn DirectoryStore>,
    engine: ReconciliationEngine,
    partition: Partition,
}

impl SyncDriver {
    /// Create a driver with the default engine configuration.
    #[must_use]
    pub fn new(store: Arc<dyn DirectoryStore>, partition: Partition) -> Self {
        Self::with_engine_config(store, EngineConfig::default(), partition)
    }

    /// Create a driver with a custom engine configuration.
    #[must_use]
    pub fn with_engine_config(
        store: Arc<dyn DirectoryStore>,
        config: EngineConfig,
        partition: Partition,
    ) -> Self {
        let engine = ReconciliationEngine::with_config(Arc::clone(&store), config);
        Self {
            store,
            engine,
            partition,
        }
    }

    /// Scheduling parameters for the host's task runner.
    #[must_use]
    pub fn task_options() -> TaskOptions {
        TaskOptions::default()
    }

    /// Run one tick against the given snapshot source.
    #[instrument(skip(self, source))]
    pub async fn run_tick(&self, source: &dyn SnapshotSource) -> TickSummary {
        let providers = match self.store.list_enabled_auth_providers(PROVIDER_NAME).await {
            Ok(providers) => providers,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate authentication providers, skipping tick");
                return TickSummary::skipped(format!("provider enumeration failed: {e}"));
            }
        };

        let owned: Vec<AuthenticationProvider> = providers
            .into_iter()
            .filter(|p| self.partition.owns(p.id))
            .collect();

        if owned.is_empty() {
            debug!("No bindings owned by this partition");
            return TickSummary::default();
        }

        if !source.test_connection().await {
            warn!("Identity provider connection test failed, skipping tick");
            return TickSummary::skipped("connection test failed".to_string());
        }

        // One snapshot per tick: every binding sees identical input.
        let snapshot = match source.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Snapshot fetch failed, skipping tick");
                return TickSummary::skipped(format!("snapshot fetch failed: {e}"));
            }
        };

        for dropped in &snapshot.skipped {
            warn!(record = %dropped, "Snapshot record dropped during normalization");
        }

        info!(
            users = snapshot.len(),
            bindings = owned.len(),
            "Reconciling bindings against snapshot"
        );

        let mut summary = TickSummary::default();
        for provider in owned {
            let options = SyncOptions {
                default_group_id: provider.settings.sync_default_group_id,
                default_group_name: provider.settings.sync_default_group_name.clone(),
            };
            let report = self
                .engine
                .reconcile(provider.team_id, provider.id, &snapshot.users, &options)
                .await;
            self.log_report(&provider, &report);
            summary.reports.push(BindingReport {
                provider_id: provider.id,
                team_id: provider.team_id,
                report,
            });
        }
        summary
    }

    fn log_report(&self, provider: &AuthenticationProvider, report: &SyncReport) {
        info!(
            provider_id = %provider.id,
            team_id = %provider.team_id,
            created = report.created,
            updated = report.updated,
            suspended = report.suspended,
            reactivated = report.reactivated,
            unchanged = report.unchanged,
            added_to_group = report.added_to_group,
            errors = report.errors.len(),
            "Directory sync completed for binding"
        );

        for error in report.errors.iter().take(MAX_LOGGED_ERRORS) {
            warn!(provider_id = %provider.id, %error, "Sync error");
        }
        if report.errors.len() > MAX_LOGGED_ERRORS {
            debug!(
                provider_id = %provider.id,
                suppressed = report.errors.len() - MAX_LOGGED_ERRORS,
                "Additional sync errors not logged"
            );
        }
    }
}
