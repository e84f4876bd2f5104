//! Keycloak admin-API client: paginated user listing and connectivity probe.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::{KeycloakConfig, KeycloakError, KeycloakResult, TokenCache};

/// Hard upper bound on users fetched in one snapshot, preventing a runaway
/// pagination loop against a misbehaving server.
const MAX_SNAPSHOT_USERS: usize = 100_000;

/// Raw user representation returned by the admin API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawKeycloakUser {
    /// Stable subject identifier.
    pub id: String,
    /// Login name.
    pub username: Option<String>,
    /// Email address; Keycloak does not require one.
    pub email: Option<String>,
    /// Given name.
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    /// Whether the account is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Custom attributes configured on the realm.
    #[serde(default)]
    pub attributes: Option<HashMap<String, Vec<String>>>,
}

fn default_enabled() -> bool {
    true
}

/// Client for the Keycloak admin REST API.
///
/// Holds the service-account token cache for its own lifetime; construct one
/// per tick and discard it afterwards.
#[derive(Debug)]
pub struct KeycloakAdminClient {
    http_client: reqwest::Client,
    config: KeycloakConfig,
    token_cache: TokenCache,
}

impl KeycloakAdminClient {
    /// Creates a new admin client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: KeycloakConfig) -> KeycloakResult<Self> {
        config.validate()?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| KeycloakError::Config(format!("Failed to create HTTP client: {e}")))?;

        let token_cache = TokenCache::new(config.clone(), http_client.clone());

        Ok(Self {
            http_client,
            config,
            token_cache,
        })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &KeycloakConfig {
        &self.config
    }

    /// Fetches every enabled user in the realm, paging through the admin API
    /// in `batch_size` steps until a short batch is returned.
    #[instrument(skip(self), fields(realm = %self.config.realm))]
    pub async fn fetch_enabled_users(
        &self,
        batch_size: usize,
    ) -> KeycloakResult<Vec<RawKeycloakUser>> {
        if batch_size == 0 {
            return Err(KeycloakError::Config(
                "batch size must be positive".to_string(),
            ));
        }

        let base = self.config.users_endpoint();
        let mut users: Vec<RawKeycloakUser> = Vec::new();
        let mut first = 0usize;

        loop {
            let url = format!("{base}?first={first}&max={batch_size}&enabled=true");
            debug!(first, batch_size, "Fetching user page");
            let page: Vec<RawKeycloakUser> = self.get_authorized(&url).await?;
            let page_len = page.len();
            users.extend(page);

            if page_len < batch_size {
                break;
            }
            first += batch_size;

            if users.len() >= MAX_SNAPSHOT_USERS {
                warn!(
                    fetched = users.len(),
                    "User listing hit the snapshot ceiling, stopping pagination"
                );
                break;
            }
        }

        debug!(count = users.len(), "Fetched enabled users");
        Ok(users)
    }

    /// Returns the number of enabled users in the realm.
    pub async fn count_enabled_users(&self) -> KeycloakResult<u64> {
        let url = format!("{}?enabled=true", self.config.users_count_endpoint());
        self.get_authorized(&url).await
    }

    /// Connectivity probe. Performs the count query and reports success;
    /// never returns an error.
    #[instrument(skip(self), fields(realm = %self.config.realm))]
    pub async fn test_connection(&self) -> bool {
        match self.count_enabled_users().await {
            Ok(count) => {
                debug!(count, "Connection test succeeded");
                true
            }
            Err(e) => {
                warn!(error = %e, "Connection test failed");
                false
            }
        }
    }

    /// GET with bearer auth. A 401/403 invalidates the cached token and the
    /// request is retried once with a fresh one.
    async fn get_authorized<T: DeserializeOwned>(&self, url: &str) -> KeycloakResult<T> {
        match self.get_once(url).await {
            Err(e) if e.is_auth() => {
                debug!("Admin call rejected, re-authenticating once");
                self.token_cache.invalidate().await;
                self.get_once(url).await
            }
            other => other,
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &str) -> KeycloakResult<T> {
        let token = self.token_cache.get_token().await?;

        let response = self
            .http_client
            .get(url)
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(KeycloakError::Auth {
                status: status.as_u16(),
                message: body,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KeycloakError::Request {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(response.json().await?)
    }
}
