//! Service-account token acquisition and caching.

use chrono::{DateTime, Duration, Utc};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::{KeycloakConfig, KeycloakError, KeycloakResult};

/// Safety margin subtracted from the token lifetime so a token is never
/// used within a minute of its expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Token response from the OpenID Connect token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[allow(dead_code)]
    token_type: String,
    #[allow(dead_code)]
    refresh_token: Option<String>,
}

/// Cached bearer token.
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    /// Returns true once the token is within the margin of its expiry.
    fn is_expired(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

/// Caches the service-account bearer token for the lifetime of one admin
/// client instance.
#[derive(Debug)]
pub struct TokenCache {
    config: KeycloakConfig,
    http_client: reqwest::Client,
    cached_token: RwLock<Option<CachedToken>>,
    margin: Duration,
}

impl TokenCache {
    /// Creates a new token cache.
    #[must_use]
    pub fn new(config: KeycloakConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
            cached_token: RwLock::new(None),
            margin: Duration::seconds(EXPIRY_MARGIN_SECS),
        }
    }

    /// Gets a valid access token, acquiring a fresh one if necessary.
    #[instrument(skip(self), fields(realm = %self.config.realm))]
    pub async fn get_token(&self) -> KeycloakResult<String> {
        {
            let cache = self.cached_token.read().await;
            if let Some(ref token) = *cache {
                if !token.is_expired(self.margin) {
                    debug!("Using cached token");
                    return Ok(token.access_token.clone());
                }
            }
        }

        debug!("Acquiring access token");
        let new_token = self.acquire_token().await?;

        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    /// Acquires a new access token via the client-credentials grant.
    async fn acquire_token(&self) -> KeycloakResult<CachedToken> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret().as_str()),
            ("grant_type", "client_credentials"),
        ];

        let response = self
            .http_client
            .post(self.config.token_endpoint())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KeycloakError::Auth {
                status: status.as_u16(),
                message: format!("token request refused: {body}"),
            });
        }

        let token_response: TokenResponse = response.json().await?;
        let expires_at = Utc::now() + Duration::seconds(token_response.expires_in);

        debug!(expires_at = %expires_at, "Acquired new token");

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }

    /// Invalidates the cached token, forcing re-authentication on next use.
    pub async fn invalidate(&self) {
        let mut cache = self.cached_token.write().await;
        *cache = None;
    }
}
