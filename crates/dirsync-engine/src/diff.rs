//! Attribute comparison between a local user and its snapshot entry.

use dirsync_core::SyncUser;

use crate::model::User;
use crate::store::UserPatch;

/// True when two emails are equal ignoring case.
#[must_use]
pub fn emails_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Result of diffing a user against its snapshot entry.
///
/// `patch` carries everything to write, including a silent casing adoption
/// when the email differs only by case. `material` is true only for real
/// attribute changes and drives the `updated` counter.
#[derive(Debug, Clone, Default)]
pub struct UserDiff {
    /// Fields to write.
    pub patch: UserPatch,
    /// Whether any counted attribute change occurred.
    pub material: bool,
}

/// Compute the attribute diff for a user against its snapshot entry.
///
/// Rules:
/// - name is replaced when the incoming value is non-empty and differs
///   exactly;
/// - email is replaced when the incoming value is non-empty and differs
///   case-insensitively; a case-only difference still adopts the incoming
///   casing but is not a counted change;
/// - avatar is replaced only when the incoming value is non-empty and the
///   stored avatar is empty or matches one of the `avatar_hints` substrings,
///   so user-uploaded avatars are never clobbered.
#[must_use]
pub fn diff_user(user: &User, incoming: &SyncUser, avatar_hints: &[String]) -> UserDiff {
    let mut diff = UserDiff::default();

    if !incoming.name.is_empty() && incoming.name != user.name {
        diff.patch.name = Some(incoming.name.clone());
        diff.material = true;
    }

    if !incoming.email.is_empty() && incoming.email != user.email {
        diff.patch.email = Some(incoming.email.clone());
        if !emails_match(&incoming.email, &user.email) {
            diff.material = true;
        }
    }

    if let Some(incoming_avatar) = incoming.avatar_url.as_deref().filter(|a| !a.is_empty()) {
        if incoming_avatar != user.avatar_url.as_deref().unwrap_or("")
            && avatar_is_replaceable(user.avatar_url.as_deref(), avatar_hints)
        {
            diff.patch.avatar_url = Some(incoming_avatar.to_string());
            diff.material = true;
        }
    }

    diff
}

/// An avatar may be replaced when absent or when it came from the IdP.
fn avatar_is_replaceable(current: Option<&str>, avatar_hints: &[String]) -> bool {
    match current {
        None => true,
        Some(url) if url.is_empty() => true,
        Some(url) => {
            let url = url.to_lowercase();
            avatar_hints
                .iter()
                .any(|hint| url.contains(&hint.to_lowercase()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UserRole;
    use chrono::Utc;
    use dirsync_core::{TeamId, UserId};

    fn user(email: &str, name: &str, avatar_url: Option<&str>) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(),
            team_id: TeamId::new(),
            email: email.to_string(),
            name: name.to_string(),
            avatar_url: avatar_url.map(String::from),
            role: UserRole::Member,
            suspended_at: None,
            suspended_by_id: None,
            last_active_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn incoming(email: &str, name: &str, avatar_url: Option<&str>) -> SyncUser {
        SyncUser {
            provider_id: "subject".to_string(),
            email: email.to_string(),
            name: name.to_string(),
            avatar_url: avatar_url.map(String::from),
        }
    }

    const HINTS: &[String] = &[];

    fn keycloak_hints() -> Vec<String> {
        vec!["keycloak".to_string()]
    }

    #[test]
    fn test_identical_user_yields_empty_diff() {
        let user = user("a@example.com", "A", None);
        let entry = incoming("a@example.com", "A", None);
        let diff = diff_user(&user, &entry, HINTS);
        assert!(diff.patch.is_empty());
        assert!(!diff.material);
    }

    #[test]
    fn test_name_change_is_material() {
        let user = user("a@example.com", "Old", None);
        let entry = incoming("a@example.com", "New", None);
        let diff = diff_user(&user, &entry, HINTS);
        assert_eq!(diff.patch.name.as_deref(), Some("New"));
        assert!(diff.material);
        assert!(diff.patch.email.is_none());
    }

    #[test]
    fn test_empty_incoming_name_is_ignored() {
        let user = user("a@example.com", "Kept", None);
        let entry = incoming("a@example.com", "", None);
        assert!(diff_user(&user, &entry, HINTS).patch.is_empty());
    }

    #[test]
    fn test_email_case_change_adopts_casing_without_counting() {
        let user = user("a@example.com", "A", None);
        let entry = incoming("A@Example.com", "A", None);
        let diff = diff_user(&user, &entry, HINTS);
        assert_eq!(diff.patch.email.as_deref(), Some("A@Example.com"));
        assert!(!diff.material);
    }

    #[test]
    fn test_email_address_change_is_material() {
        let user = user("a@example.com", "A", None);
        let entry = incoming("b@example.com", "A", None);
        let diff = diff_user(&user, &entry, HINTS);
        assert_eq!(diff.patch.email.as_deref(), Some("b@example.com"));
        assert!(diff.material);
    }

    #[test]
    fn test_avatar_set_when_missing() {
        let user = user("a@example.com", "A", None);
        let entry = incoming("a@example.com", "A", Some("https://idp/x.png"));
        let diff = diff_user(&user, &entry, HINTS);
        assert_eq!(diff.patch.avatar_url.as_deref(), Some("https://idp/x.png"));
        assert!(diff.material);
    }

    #[test]
    fn test_user_uploaded_avatar_is_protected() {
        let user = user(
            "a@example.com",
            "A",
            Some("https://cdn.example.com/uploads/me.png"),
        );
        let entry = incoming("a@example.com", "A", Some("https://idp/x.png"));
        let diff = diff_user(&user, &entry, &keycloak_hints());
        assert!(diff.patch.avatar_url.is_none());
        assert!(!diff.material);
    }

    #[test]
    fn test_idp_sourced_avatar_is_replaced() {
        let user = user(
            "a@example.com",
            "A",
            Some("https://sso.example.com/keycloak/avatars/old.png"),
        );
        let entry = incoming("a@example.com", "A", Some("https://idp/new.png"));
        let diff = diff_user(&user, &entry, &keycloak_hints());
        assert_eq!(diff.patch.avatar_url.as_deref(), Some("https://idp/new.png"));
    }

    #[test]
    fn test_emails_match() {
        assert!(emails_match("A@X.COM", "a@x.com"));
        assert!(!emails_match("a@x.com", "b@x.com"));
    }
}
