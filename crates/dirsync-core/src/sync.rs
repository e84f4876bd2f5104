//! Canonical snapshot types exchanged between the IdP client and the engine.

use serde::{Deserialize, Serialize};

/// One enabled user as reported by the identity provider, normalized to the
/// shape the reconciliation engine consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncUser {
    /// Stable subject identifier assigned by the IdP.
    pub provider_id: String,
    /// Email address, provider-supplied casing preserved.
    pub email: String,
    /// Display name; may be empty.
    pub name: String,
    /// Avatar URL, if the IdP exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Summary of one reconciliation run for a single binding.
///
/// The counts are total over the inputs plus the existing linked users; a
/// user may contribute to both `updated` and `reactivated` in the same run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Users newly created in the local directory.
    pub created: u32,
    /// Users whose attributes were changed.
    pub updated: u32,
    /// Linked users absent from the snapshot that were suspended.
    pub suspended: u32,
    /// Suspended users that reappeared and were reactivated.
    pub reactivated: u32,
    /// Users requiring no mutation.
    pub unchanged: u32,
    /// Users added to the default group on creation.
    pub added_to_group: u32,
    /// Human-readable error strings for per-record and safety failures.
    pub errors: Vec<String>,
}

impl SyncReport {
    /// Create an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sum of all per-user outcome counters (group additions excluded).
    #[must_use]
    pub fn total(&self) -> u32 {
        self.created + self.updated + self.suspended + self.reactivated + self.unchanged
    }

    /// True when the run mutated nothing and recorded no errors.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.created == 0
            && self.updated == 0
            && self.suspended == 0
            && self.reactivated == 0
            && self.added_to_group == 0
            && self.errors.is_empty()
    }
}

/// A normalized point-in-time view of the IdP's enabled users.
///
/// `skipped` carries the normalizer's per-record error strings for raw
/// records that were dropped (e.g. no email address).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Users that survived normalization.
    pub users: Vec<SyncUser>,
    /// Error strings for dropped records.
    pub skipped: Vec<String>,
}

impl Snapshot {
    /// Number of usable users in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// True when no usable users survived normalization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
