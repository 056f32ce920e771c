//! Allow-list records and the snapshot mirror built from them.

use std::collections::HashSet;

use allowgate_core::{AppError, AppResult, Identity};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Minimum character count accepted for an identity being granted.
///
/// Guards against typos and empty input; it is not a cryptographic check.
pub const GRANT_IDENTITY_MIN_LENGTH: usize = 10;

/// Validates an identity string before it is written to the allow-list.
pub fn validate_grant_identity(value: &str) -> AppResult<Identity> {
    if value.chars().count() < GRANT_IDENTITY_MIN_LENGTH {
        return Err(AppError::Validation(format!(
            "identity must be at least {GRANT_IDENTITY_MIN_LENGTH} characters"
        )));
    }

    Identity::new(value)
}

/// One allow-list document. Only its existence grants access; the audit fields
/// are informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowListEntry {
    identity: Identity,
    added_by: Option<Identity>,
    timestamp: Option<DateTime<Utc>>,
}

impl AllowListEntry {
    /// Builds a new grant for `identity`, recorded as issued by `granted_by`.
    pub fn grant(identity: &str, granted_by: &Identity, at: DateTime<Utc>) -> AppResult<Self> {
        Ok(Self {
            identity: validate_grant_identity(identity)?,
            added_by: Some(granted_by.clone()),
            timestamp: Some(at),
        })
    }

    /// Rebuilds an entry observed in the remote collection.
    ///
    /// Remote documents are trusted as-is: membership does not depend on the
    /// grant-time length check or on the audit fields being present.
    #[must_use]
    pub fn observed(
        identity: Identity,
        added_by: Option<Identity>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            identity,
            added_by,
            timestamp,
        }
    }

    /// Returns the document key.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Returns the grantor, if recorded.
    #[must_use]
    pub fn added_by(&self) -> Option<&Identity> {
        self.added_by.as_ref()
    }

    /// Returns the grant instant in ISO-8601 with millisecond precision.
    #[must_use]
    pub fn timestamp_iso(&self) -> Option<String> {
        self.timestamp
            .map(|value| value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Full point-in-time copy of the remote allow-list, in delivery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowListSnapshot {
    entries: Vec<AllowListEntry>,
}

impl AllowListSnapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a snapshot from one delivery. Repeated keys keep their first
    /// occurrence.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = AllowListEntry>) -> Self {
        let mut seen = HashSet::new();
        let entries = entries
            .into_iter()
            .filter(|entry| seen.insert(entry.identity.clone()))
            .collect();

        Self { entries }
    }

    /// Builds a snapshot holding bare keys without audit fields.
    #[must_use]
    pub fn from_identities(identities: impl IntoIterator<Item = Identity>) -> Self {
        Self::from_entries(
            identities
                .into_iter()
                .map(|identity| AllowListEntry::observed(identity, None, None)),
        )
    }

    /// Returns whether `identity` is currently allowed.
    #[must_use]
    pub fn contains(&self, identity: &Identity) -> bool {
        self.entries.iter().any(|entry| &entry.identity == identity)
    }

    /// Returns the entries in delivery order.
    #[must_use]
    pub fn entries(&self) -> &[AllowListEntry] {
        self.entries.as_slice()
    }

    /// Returns the keys in delivery order.
    pub fn identities(&self) -> impl Iterator<Item = &Identity> {
        self.entries.iter().map(AllowListEntry::identity)
    }

    /// Returns the number of allowed identities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether nobody is allowed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Location of the allow-list collection for one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowListPath {
    app_id: String,
}

impl AllowListPath {
    /// Creates the path for an application id.
    pub fn new(app_id: impl Into<String>) -> AppResult<Self> {
        let app_id = app_id.into();
        let trimmed = app_id.trim();
        if trimmed.is_empty() {
            return Err(AppError::Configuration(
                "application id must not be empty".to_owned(),
            ));
        }

        if trimmed.contains('/') {
            return Err(AppError::Configuration(format!(
                "application id '{trimmed}' must not contain '/'"
            )));
        }

        Ok(Self {
            app_id: trimmed.to_owned(),
        })
    }

    /// Returns the application id.
    #[must_use]
    pub fn app_id(&self) -> &str {
        self.app_id.as_str()
    }

    /// Returns the path segments of the collection.
    #[must_use]
    pub fn segments(&self) -> [&str; 5] {
        [
            "artifacts",
            self.app_id.as_str(),
            "public",
            "data",
            "allowed_users",
        ]
    }

    /// Returns `artifacts/{appId}/public/data/allowed_users`.
    #[must_use]
    pub fn collection_path(&self) -> String {
        self.segments().join("/")
    }

    /// Returns the document path for one identity.
    #[must_use]
    pub fn document_path(&self, identity: &Identity) -> String {
        format!("{}/{}", self.collection_path(), identity.as_str())
    }
}
