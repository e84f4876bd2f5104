//! # dirsync-scheduler
//!
//! The periodic driver tying the workspace together: per-replica
//! partitioning of authentication bindings, environment configuration, and
//! the tick that fetches one IdP snapshot and reconciles every owned binding
//! against it.

pub mod config;
pub mod driver;
pub mod partition;
pub mod source;

pub use config::{ConfigError, SyncConfig};
pub use driver::{BindingReport, SyncDriver, TaskOptions, TaskPriority, TickSummary, PROVIDER_NAME};
pub use partition::{InvalidPartition, Partition};
pub use source::{KeycloakSource, SnapshotSource, SourceError};
