//! Reconciliation scope window
//!
//! A run only considers rows whose work date falls inside an inclusive date
//! range. Both the extractor and the store snapshot use the same window.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::fmt;

/// Inclusive date range processed by one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub description: String,
}

impl ScopeWindow {
    /// The calendar month containing `today`
    pub fn current_month(today: NaiveDate) -> Self {
        let start = today.with_day(1).unwrap_or(today);
        let end = last_day_of_month(today.year(), today.month()).unwrap_or(today);
        Self {
            start,
            end,
            description: format!("current month ({})", start.format("%B %Y")),
        }
    }

    /// An explicit range
    ///
    /// A missing start defaults to January 1st and a missing end to December
    /// 31st of `today`'s year. Reversed bounds are swapped.
    pub fn between(start: Option<NaiveDate>, end: Option<NaiveDate>, today: NaiveDate) -> Self {
        let year = today.year();
        let mut first = start
            .or_else(|| NaiveDate::from_ymd_opt(year, 1, 1))
            .unwrap_or(today);
        let mut last = end
            .or_else(|| NaiveDate::from_ymd_opt(year, 12, 31))
            .unwrap_or(today);
        if last < first {
            std::mem::swap(&mut first, &mut last);
        }
        Self {
            start: first,
            end: last,
            description: format!("{first} to {last}"),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for ScopeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}
