//! # dirsync-engine
//!
//! Two-way set reconciliation between a local user directory and an IdP
//! snapshot. The engine identifies users by two independent keys (external
//! subject ID and case-insensitive email), mutates each user in its own
//! scoped transaction, and holds two safety invariants unconditionally: an
//! empty snapshot never suspends anyone, and user-owned attributes are never
//! overwritten.
//!
//! The [`store::DirectoryStore`] trait is the only storage dependency;
//! [`memory::InMemoryDirectory`] backs it for tests and embedding.

pub mod diff;
pub mod engine;
pub mod memory;
pub mod model;
pub mod store;

pub use engine::{EngineConfig, ReconciliationEngine, SyncOptions};
pub use memory::InMemoryDirectory;
pub use model::{
    AuthenticationProvider, Group, GroupMembership, GroupPermission, ProviderSettings, Team, User,
    UserAuthentication, UserRole,
};
pub use store::{
    DirectoryStore, DirectoryTxn, LinkedUser, NewAuthentication, NewUser, StoreError, StoreResult,
    UserPatch,
};
