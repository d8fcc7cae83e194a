//! Classification of incoming records against the persisted snapshot

use crate::core::dedup::DedupOutcome;
use crate::domain::change::text_eq;
use crate::domain::{ChangeEntry, DeduplicatedRecord, PersistedRecord, PersistedSnapshot};

/// Classifies every key present on either side
///
/// Keys only in the batch are INSERT, keys on both sides are UPDATE or
/// UNCHANGED, keys only in the snapshot are STALE. The result is sorted by
/// key and depends on nothing but the two inputs.
pub fn diff(incoming: &DedupOutcome, persisted: &PersistedSnapshot) -> Vec<ChangeEntry> {
    let mut entries = Vec::with_capacity(incoming.records.len() + persisted.len());

    for (key, record) in &incoming.records {
        match persisted.get(key) {
            None => entries.push(ChangeEntry::insert(record.clone())),
            Some(before) if is_unchanged(before, record) => {
                entries.push(ChangeEntry::unchanged(before.clone(), record.clone()))
            }
            Some(before) => entries.push(ChangeEntry::update(before.clone(), record.clone())),
        }
    }

    for (key, before) in persisted {
        if !incoming.records.contains_key(key) {
            entries.push(ChangeEntry::stale(before.clone()));
        }
    }

    entries.sort_by(|a, b| a.key.cmp(&b.key));
    entries
}

fn is_unchanged(before: &PersistedRecord, after: &DeduplicatedRecord) -> bool {
    before.working_hours == after.working_hours
        && text_eq(before.role.as_deref(), after.role.as_deref())
        && text_eq(before.location.as_deref(), after.location.as_deref())
        && text_eq(before.status.as_deref(), after.status.as_deref())
}
