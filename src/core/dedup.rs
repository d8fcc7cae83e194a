//! In-batch deduplication
//!
//! Several workbooks (or several rows of one workbook) can describe the same
//! timesheet line. The deduplicator collapses them to one authoritative record
//! per natural key before anything is compared against the store.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::domain::{DeduplicatedRecord, DuplicateError, NaturalKey, NormalizedRecord, SourceId};

/// Why a record did not survive deduplication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DropReason {
    /// A later record with the same key was kept
    DuplicateInBatch,
    /// Deduplication is disabled and the key occurred more than once
    DuplicateRejected,
}

/// A record removed by the deduplicator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedDuplicate {
    pub key: NaturalKey,
    pub source: SourceId,
    pub row_number: usize,
    pub reason: DropReason,
    pub detail: DuplicateError,
}

/// Result of deduplicating one batch
#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    /// Exactly one record per key
    pub records: BTreeMap<NaturalKey, DeduplicatedRecord>,
    /// Keys in the order they were first encountered
    pub first_seen: Vec<NaturalKey>,
    pub dropped: Vec<DroppedDuplicate>,
}

impl DedupOutcome {
    pub fn rejected_count(&self) -> usize {
        self.dropped
            .iter()
            .filter(|d| d.reason == DropReason::DuplicateRejected)
            .count()
    }
}

/// Collapses records sharing a natural key
#[derive(Debug, Clone, Copy)]
pub struct Deduplicator {
    enabled: bool,
}

impl Deduplicator {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Deduplicates one batch
    ///
    /// With deduplication enabled the winner for each key is the record with
    /// the latest `extracted_at`, then the lexicographically last source id,
    /// then the highest row number. With it disabled every record of a
    /// repeated key is rejected.
    pub fn deduplicate(&self, records: Vec<NormalizedRecord>) -> DedupOutcome {
        let mut first_seen = Vec::new();
        let mut groups: HashMap<NaturalKey, Vec<NormalizedRecord>> = HashMap::new();
        for record in records {
            let group = groups.entry(record.key.clone()).or_default();
            if group.is_empty() {
                first_seen.push(record.key.clone());
            }
            group.push(record);
        }

        let mut outcome = DedupOutcome {
            first_seen,
            ..Default::default()
        };

        for key in &outcome.first_seen {
            let Some(mut group) = groups.remove(key) else {
                continue;
            };

            if group.len() == 1 {
                if let Some(only) = group.pop() {
                    outcome
                        .records
                        .insert(key.clone(), DeduplicatedRecord::new(only));
                }
                continue;
            }

            if !self.enabled {
                let occurrences = group.len();
                tracing::warn!(key = %key, occurrences, "Rejecting ambiguous duplicate key");
                outcome.dropped.extend(group.into_iter().map(|r| DroppedDuplicate {
                    key: key.clone(),
                    source: r.source,
                    row_number: r.row_number,
                    reason: DropReason::DuplicateRejected,
                    detail: DuplicateError::Rejected {
                        key: key.to_string(),
                        occurrences,
                    },
                }));
                continue;
            }

            let winner_index = group
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| precedence(a).cmp(&precedence(b)))
                .map(|(i, _)| i)
                .unwrap_or(0);
            let winner = group.swap_remove(winner_index);

            for loser in group {
                tracing::debug!(
                    key = %key,
                    dropped_source = %loser.source,
                    dropped_row = loser.row_number,
                    kept_source = %winner.source,
                    "Dropping superseded duplicate"
                );
                outcome.dropped.push(DroppedDuplicate {
                    key: key.clone(),
                    source: loser.source,
                    row_number: loser.row_number,
                    reason: DropReason::DuplicateInBatch,
                    detail: DuplicateError::InBatch {
                        key: key.to_string(),
                        kept_source: winner.source.to_string(),
                    },
                });
            }
            outcome
                .records
                .insert(key.clone(), DeduplicatedRecord::new(winner));
        }

        outcome
    }
}

fn precedence(record: &NormalizedRecord) -> (chrono::DateTime<chrono::Utc>, &SourceId, usize) {
    (record.extracted_at, &record.source, record.row_number)
}
