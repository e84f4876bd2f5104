//! Error types for the Keycloak admin client.

use thiserror::Error;

/// Result type alias using `KeycloakError`.
pub type KeycloakResult<T> = Result<T, KeycloakError>;

/// Errors that can occur when talking to the Keycloak admin API.
#[derive(Debug, Error)]
pub enum KeycloakError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token endpoint refused the client credentials, or an admin call
    /// came back 401/403.
    #[error("Authentication error ({status}): {message}")]
    Auth { status: u16, message: String },

    /// Admin API returned a non-2xx status other than 401/403.
    #[error("Admin API request failed ({status}): {message}")]
    Request { status: u16, message: String },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl KeycloakError {
    /// True for 401/403 responses, which invalidate the cached token.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}
