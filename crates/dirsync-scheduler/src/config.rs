//! Environment configuration for the sync driver.

use secrecy::SecretString;
use thiserror::Error;

use dirsync_keycloak::KeycloakConfig;

/// Configuration errors with the offending variable name.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("Missing environment variable {var}")]
    Missing { var: &'static str },

    /// An environment variable holds an unusable value.
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Driver configuration assembled from `OIDC_SYNC_*` environment variables.
///
/// When the master switch is off the IdP settings are not read at all, so a
/// disabled deployment needs no further variables.
#[derive(Debug)]
pub struct SyncConfig {
    /// Master switch (`OIDC_SYNC_ENABLED`).
    pub enabled: bool,
    /// IdP connection settings; present only when enabled.
    pub keycloak: Option<KeycloakConfig>,
}

impl SyncConfig {
    /// Load configuration from the process environment.
    ///
    /// Variables:
    /// - `OIDC_SYNC_ENABLED` — master switch (defaults to off)
    /// - `OIDC_SYNC_ADMIN_URL` — IdP base URL, no trailing slash
    /// - `OIDC_SYNC_REALM` — realm name
    /// - `OIDC_SYNC_CLIENT_ID` / `OIDC_SYNC_CLIENT_SECRET` — service-account
    ///   credentials; fall back to `OIDC_CLIENT_ID` / `OIDC_CLIENT_SECRET`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let enabled = match lookup("OIDC_SYNC_ENABLED") {
            Some(value) => parse_bool("OIDC_SYNC_ENABLED", &value)?,
            None => false,
        };

        if !enabled {
            return Ok(Self {
                enabled: false,
                keycloak: None,
            });
        }

        let admin_url = require(&lookup, "OIDC_SYNC_ADMIN_URL")?;
        let realm = require(&lookup, "OIDC_SYNC_REALM")?;
        let client_id = lookup("OIDC_SYNC_CLIENT_ID")
            .or_else(|| lookup("OIDC_CLIENT_ID"))
            .ok_or(ConfigError::Missing {
                var: "OIDC_SYNC_CLIENT_ID",
            })?;
        let client_secret = lookup("OIDC_SYNC_CLIENT_SECRET")
            .or_else(|| lookup("OIDC_CLIENT_SECRET"))
            .ok_or(ConfigError::Missing {
                var: "OIDC_SYNC_CLIENT_SECRET",
            })?;

        let keycloak = KeycloakConfig::new(
            admin_url,
            realm,
            client_id,
            SecretString::new(client_secret),
        )
        .map_err(|e| ConfigError::Invalid {
            var: "OIDC_SYNC_ADMIN_URL",
            reason: e.to_string(),
        })?;

        Ok(Self {
            enabled: true,
            keycloak: Some(keycloak),
        })
    }
}

fn require(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<String, ConfigError> {
    lookup(var)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing { var })
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            reason: format!("expected a boolean, got {value:?}"),
        }),
    }
}
