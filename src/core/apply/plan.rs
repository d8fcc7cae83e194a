//! Write plan construction

use crate::domain::{ChangeEntry, ChangeKind};

/// Change entries split into store writes and entries that need no write
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WritePlan {
    /// INSERT and UPDATE entries in key order
    pub writes: Vec<ChangeEntry>,
    /// UNCHANGED and STALE entries in key order
    pub skipped: Vec<ChangeEntry>,
}

impl WritePlan {
    pub fn from_entries(mut entries: Vec<ChangeEntry>) -> Self {
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        let (writes, skipped) = entries.into_iter().partition(|e| e.kind.is_write());
        Self { writes, skipped }
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.skipped.is_empty()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.writes
            .iter()
            .chain(self.skipped.iter())
            .filter(|e| e.kind == kind)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NaturalKey, PersistedRecord};
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn stale(day: u32) -> ChangeEntry {
        let key = NaturalKey::new(NaiveDate::from_ymd_opt(2025, 1, day).unwrap(), "e", "p").unwrap();
        ChangeEntry::stale(PersistedRecord {
            key,
            employee_name: "E".into(),
            project_id: "P".into(),
            working_hours: Decimal::ONE,
            role: None,
            location: None,
            status: None,
            source: None,
            last_modified: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        })
    }

    #[test]
    fn test_non_writes_are_skipped_in_key_order() {
        let plan = WritePlan::from_entries(vec![stale(9), stale(2)]);
        assert!(plan.writes.is_empty());
        assert_eq!(plan.skipped.len(), 2);
        assert!(plan.skipped[0].key < plan.skipped[1].key);
        assert_eq!(plan.count(ChangeKind::Stale), 2);
    }

    #[test]
    fn test_empty_plan() {
        assert!(WritePlan::from_entries(Vec::new()).is_empty());
    }
}
