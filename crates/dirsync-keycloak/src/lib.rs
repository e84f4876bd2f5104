//! Keycloak admin-API client for dirsync.
//!
//! Acquires and caches a service-account bearer token via the
//! client-credentials grant, pages through the realm's enabled users, and
//! normalizes the raw records into canonical [`dirsync_core::SyncUser`]
//! values. Transport and authentication failures surface as typed
//! [`KeycloakError`]s; the caller decides whether to skip the tick.

mod auth;
mod client;
mod config;
mod error;
pub mod normalize;

pub use auth::TokenCache;
pub use client::{KeycloakAdminClient, RawKeycloakUser};
pub use config::KeycloakConfig;
pub use error::{KeycloakError, KeycloakResult};
