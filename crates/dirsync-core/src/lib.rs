//! # dirsync-core
//!
//! Shared types for the dirsync workspace: strongly typed identifiers and
//! the canonical snapshot records (`SyncUser`, `SyncReport`) exchanged
//! between the IdP client, the reconciliation engine, and the driver.

pub mod ids;
pub mod sync;

pub use ids::{AuthProviderId, GroupId, ParseIdError, TeamId, UserId};
pub use sync::{Snapshot, SyncReport, SyncUser};
