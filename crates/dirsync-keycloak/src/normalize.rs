//! Raw admin-API records to canonical `SyncUser` normalization.

use dirsync_core::{Snapshot, SyncUser};
use tracing::debug;

use crate::RawKeycloakUser;

/// Fallback display name when the record carries nothing usable.
const UNKNOWN_USER: &str = "Unknown User";

/// Attribute key checked for an avatar URL.
const AVATAR_ATTRIBUTE: &str = "picture";

/// Composes a display name from the raw record.
///
/// Order: `"first last"` if both present, else first, else last, else
/// username, else email, else `"Unknown User"`.
#[must_use]
pub fn display_name(raw: &RawKeycloakUser) -> String {
    let first = raw.first_name.as_deref().unwrap_or("").trim();
    let last = raw.last_name.as_deref().unwrap_or("").trim();

    if !first.is_empty() && !last.is_empty() {
        return format!("{first} {last}");
    }
    if !first.is_empty() {
        return first.to_string();
    }
    if !last.is_empty() {
        return last.to_string();
    }
    if let Some(username) = raw.username.as_deref().filter(|u| !u.trim().is_empty()) {
        return username.trim().to_string();
    }
    if let Some(email) = raw.email.as_deref().filter(|e| !e.trim().is_empty()) {
        return email.trim().to_string();
    }
    UNKNOWN_USER.to_string()
}

/// Extracts an avatar URL from the record's custom attributes, if present.
fn avatar_url(raw: &RawKeycloakUser) -> Option<String> {
    raw.attributes
        .as_ref()
        .and_then(|attrs| attrs.get(AVATAR_ATTRIBUTE))
        .and_then(|values| values.first())
        .filter(|url| !url.trim().is_empty())
        .cloned()
}

/// Normalizes raw admin-API records into a snapshot.
///
/// Records without an email address are dropped; each drop produces an error
/// string naming the record's subject ID.
#[must_use]
pub fn normalize_users(raw_users: Vec<RawKeycloakUser>) -> Snapshot {
    let mut snapshot = Snapshot::default();

    for raw in raw_users {
        let email = match raw.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => email.to_string(),
            _ => {
                debug!(provider_id = %raw.id, "Dropping user without email");
                snapshot
                    .skipped
                    .push(format!("Skipping user {}: no email address", raw.id));
                continue;
            }
        };

        snapshot.users.push(SyncUser {
            name: display_name(&raw),
            avatar_url: avatar_url(&raw),
            provider_id: raw.id,
            email,
        });
    }

    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str) -> RawKeycloakUser {
        RawKeycloakUser {
            id: id.to_string(),
            username: None,
            email: None,
            first_name: None,
            last_name: None,
            enabled: true,
            attributes: None,
        }
    }

    #[test]
    fn test_display_name_first_and_last() {
        let mut user = raw("u1");
        user.first_name = Some("Jane".to_string());
        user.last_name = Some("Doe".to_string());
        assert_eq!(display_name(&user), "Jane Doe");
    }

    #[test]
    fn test_display_name_single_parts() {
        let mut user = raw("u1");
        user.first_name = Some("Jane".to_string());
        assert_eq!(display_name(&user), "Jane");

        let mut user = raw("u1");
        user.last_name = Some("Doe".to_string());
        assert_eq!(display_name(&user), "Doe");
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut user = raw("u1");
        user.username = Some("jdoe".to_string());
        user.email = Some("jdoe@example.com".to_string());
        assert_eq!(display_name(&user), "jdoe");

        let mut user = raw("u1");
        user.email = Some("jdoe@example.com".to_string());
        assert_eq!(display_name(&user), "jdoe@example.com");

        assert_eq!(display_name(&raw("u1")), "Unknown User");
    }

    #[test]
    fn test_normalize_drops_missing_email() {
        let mut with_email = raw("keeps");
        with_email.email = Some("kept@example.com".to_string());

        let snapshot = normalize_users(vec![raw("dropped"), with_email]);

        assert_eq!(snapshot.users.len(), 1);
        assert_eq!(snapshot.users[0].email, "kept@example.com");
        assert_eq!(snapshot.skipped.len(), 1);
        assert!(snapshot.skipped[0].contains("dropped"));
        assert!(snapshot.skipped[0].contains("no email address"));
    }

    #[test]
    fn test_normalize_blank_email_is_dropped() {
        let mut user = raw("blank");
        user.email = Some("   ".to_string());
        let snapshot = normalize_users(vec![user]);
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.skipped.len(), 1);
    }

    #[test]
    fn test_normalize_picks_up_avatar_attribute() {
        let mut user = raw("u1");
        user.email = Some("a@example.com".to_string());
        user.attributes = Some(
            [(
                "picture".to_string(),
                vec!["https://sso.example.com/a.png".to_string()],
            )]
            .into_iter()
            .collect(),
        );

        let snapshot = normalize_users(vec![user]);
        assert_eq!(
            snapshot.users[0].avatar_url.as_deref(),
            Some("https://sso.example.com/a.png")
        );
    }

    #[test]
    fn test_normalize_preserves_email_case() {
        let mut user = raw("u1");
        user.email = Some("Jane.Doe@Example.COM".to_string());
        let snapshot = normalize_users(vec![user]);
        assert_eq!(snapshot.users[0].email, "Jane.Doe@Example.COM");
    }
}
