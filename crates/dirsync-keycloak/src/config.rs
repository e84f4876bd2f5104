//! Keycloak connection configuration and endpoint construction.

use secrecy::SecretString;

use crate::{KeycloakError, KeycloakResult};

/// Connection settings for one Keycloak installation.
#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    /// Base URL of the Keycloak server, without a trailing slash.
    pub admin_url: String,
    /// Realm the users live in.
    pub realm: String,
    /// Service-account client ID used for the client-credentials grant.
    pub client_id: String,
    /// Service-account client secret.
    pub client_secret: SecretString,
}

impl KeycloakConfig {
    /// Create a config, normalizing a trailing slash on the admin URL.
    pub fn new(
        admin_url: impl Into<String>,
        realm: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> KeycloakResult<Self> {
        let admin_url = admin_url.into().trim_end_matches('/').to_string();
        let config = Self {
            admin_url,
            realm: realm.into(),
            client_id: client_id.into(),
            client_secret,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate that all required fields are present.
    pub fn validate(&self) -> KeycloakResult<()> {
        if self.admin_url.is_empty() {
            return Err(KeycloakError::Config("admin URL must not be empty".into()));
        }
        if self.realm.is_empty() {
            return Err(KeycloakError::Config("realm must not be empty".into()));
        }
        if self.client_id.is_empty() {
            return Err(KeycloakError::Config("client ID must not be empty".into()));
        }
        url::Url::parse(&self.admin_url)?;
        Ok(())
    }

    /// OpenID Connect token endpoint for the realm.
    #[must_use]
    pub fn token_endpoint(&self) -> String {
        format!(
            "{}/realms/{}/protocol/openid-connect/token",
            self.admin_url, self.realm
        )
    }

    /// Admin endpoint listing users in the realm.
    #[must_use]
    pub fn users_endpoint(&self) -> String {
        format!("{}/admin/realms/{}/users", self.admin_url, self.realm)
    }

    /// Admin endpoint returning the user count.
    #[must_use]
    pub fn users_count_endpoint(&self) -> String {
        format!("{}/admin/realms/{}/users/count", self.admin_url, self.realm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> KeycloakResult<KeycloakConfig> {
        KeycloakConfig::new(url, "main", "sync-client", SecretString::new("s3cret".into()))
    }

    #[test]
    fn test_trailing_slash_normalized() {
        let config = config("https://sso.example.com/").unwrap();
        assert_eq!(config.admin_url, "https://sso.example.com");
        assert_eq!(
            config.token_endpoint(),
            "https://sso.example.com/realms/main/protocol/openid-connect/token"
        );
    }

    #[test]
    fn test_endpoints() {
        let config = config("https://sso.example.com").unwrap();
        assert_eq!(
            config.users_endpoint(),
            "https://sso.example.com/admin/realms/main/users"
        );
        assert_eq!(
            config.users_count_endpoint(),
            "https://sso.example.com/admin/realms/main/users/count"
        );
    }

    #[test]
    fn test_rejects_empty_realm() {
        let err = KeycloakConfig::new(
            "https://sso.example.com",
            "",
            "sync-client",
            SecretString::new("s3cret".into()),
        )
        .unwrap_err();
        assert!(matches!(err, KeycloakError::Config(_)));
    }

    #[test]
    fn test_rejects_invalid_url() {
        assert!(config("not a url").is_err());
    }
}
