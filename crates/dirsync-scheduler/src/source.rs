//! Snapshot source port and the Keycloak adapter.

use async_trait::async_trait;
use thiserror::Error;

use dirsync_core::Snapshot;
use dirsync_keycloak::{normalize, KeycloakAdminClient};

/// Page size used when listing users from the IdP.
const FETCH_BATCH_SIZE: usize = 100;

/// Snapshot acquisition failed; the driver skips the tick.
#[derive(Debug, Error)]
#[error("identity provider error: {0}")]
pub struct SourceError(pub String);

/// Where the driver gets its snapshots from.
///
/// A snapshot must be complete or absent: implementations return an error
/// rather than a partial user list.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Cheap connectivity probe; never errors.
    async fn test_connection(&self) -> bool;

    /// Fetch and normalize the full set of enabled users.
    async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError>;
}

/// Keycloak-backed snapshot source.
pub struct KeycloakSource {
    client: KeycloakAdminClient,
    batch_size: usize,
}

impl KeycloakSource {
    /// Wrap an admin client with the default batch size.
    #[must_use]
    pub fn new(client: KeycloakAdminClient) -> Self {
        Self {
            client,
            batch_size: FETCH_BATCH_SIZE,
        }
    }

    /// Override the listing batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

#[async_trait]
impl SnapshotSource for KeycloakSource {
    async fn test_connection(&self) -> bool {
        self.client.test_connection().await
    }

    async fn fetch_snapshot(&self) -> Result<Snapshot, SourceError> {
        let raw = self
            .client
            .fetch_enabled_users(self.batch_size)
            .await
            .map_err(|e| SourceError(e.to_string()))?;
        Ok(normalize::normalize_users(raw))
    }
}
