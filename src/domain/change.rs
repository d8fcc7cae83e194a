//! Change entries and their apply outcomes

use serde::Serialize;
use std::fmt;

use super::errors::ErrorDetail;
use super::key::NaturalKey;
use super::record::{DeduplicatedRecord, PersistedRecord};

/// Classification of one key by the differ
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Unchanged,
    /// Persisted but absent from the batch; reported, never deleted
    Stale,
}

impl ChangeKind {
    /// Whether this kind results in a store write
    pub fn is_write(&self) -> bool {
        matches!(self, ChangeKind::Insert | ChangeKind::Update)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Unchanged => "UNCHANGED",
            ChangeKind::Stale => "STALE",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified key with its before and after images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEntry {
    pub kind: ChangeKind,
    pub key: NaturalKey,
    pub before: Option<PersistedRecord>,
    pub after: Option<DeduplicatedRecord>,
}

impl ChangeEntry {
    pub fn insert(after: DeduplicatedRecord) -> Self {
        Self {
            kind: ChangeKind::Insert,
            key: after.key.clone(),
            before: None,
            after: Some(after),
        }
    }

    pub fn update(before: PersistedRecord, after: DeduplicatedRecord) -> Self {
        Self {
            kind: ChangeKind::Update,
            key: after.key.clone(),
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn unchanged(before: PersistedRecord, after: DeduplicatedRecord) -> Self {
        Self {
            kind: ChangeKind::Unchanged,
            key: after.key.clone(),
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn stale(before: PersistedRecord) -> Self {
        Self {
            kind: ChangeKind::Stale,
            key: before.key.clone(),
            before: Some(before),
            after: None,
        }
    }

    /// Names of the compared fields that differ between before and after
    ///
    /// Empty unless both images are present.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let (Some(before), Some(after)) = (&self.before, &self.after) else {
            return Vec::new();
        };

        let mut fields = Vec::new();
        if before.working_hours != after.working_hours {
            fields.push("working_hours");
        }
        if !text_eq(before.role.as_deref(), after.role.as_deref()) {
            fields.push("role");
        }
        if !text_eq(before.location.as_deref(), after.location.as_deref()) {
            fields.push("location");
        }
        if !text_eq(before.status.as_deref(), after.status.as_deref()) {
            fields.push("status");
        }
        fields
    }
}

/// Case-insensitive, whitespace-insensitive comparison of optional text
///
/// `None` equals only `None`.
pub fn text_eq(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.trim().to_lowercase() == b.trim().to_lowercase(),
        _ => false,
    }
}

/// What happened to one change entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplyResult {
    Applied,
    Failed,
    Skipped,
}

impl fmt::Display for ApplyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ApplyResult::Applied => "APPLIED",
            ApplyResult::Failed => "FAILED",
            ApplyResult::Skipped => "SKIPPED",
        })
    }
}

/// Result of applying (or skipping) one change entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub key: NaturalKey,
    pub kind: ChangeKind,
    pub result: ApplyResult,
    pub error: Option<ErrorDetail>,
}

impl ApplyOutcome {
    pub fn applied(key: NaturalKey, kind: ChangeKind) -> Self {
        Self {
            key,
            kind,
            result: ApplyResult::Applied,
            error: None,
        }
    }

    pub fn skipped(key: NaturalKey, kind: ChangeKind) -> Self {
        Self {
            key,
            kind,
            result: ApplyResult::Skipped,
            error: None,
        }
    }

    pub fn failed(key: NaturalKey, kind: ChangeKind, error: ErrorDetail) -> Self {
        Self {
            key,
            kind,
            result: ApplyResult::Failed,
            error: Some(error),
        }
    }
}
