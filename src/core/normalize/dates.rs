//! Work-date parsing
//!
//! Spreadsheet dates arrive as native date cells, as Excel serial numbers, or
//! as free text typed by whoever filled in the sheet.

use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::domain::RawValue;

/// Largest serial Excel can represent (9999-12-31)
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Day zero of the 1900 date system as used by Excel and calamine
///
/// Excel treats 1900 as a leap year, so serials after February 1900 line up
/// with a 1899-12-30 epoch.
fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

/// Converts an Excel serial date, discarding any time-of-day fraction
pub fn from_excel_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_EXCEL_SERIAL {
        return None;
    }
    excel_epoch()?.checked_add_days(Days::new(serial.trunc() as u64))
}

/// Parses text against `formats` in order, first match wins
///
/// Each format is tried as a plain date and then as a date-time, so formats
/// carrying a time component are accepted and the time is discarded.
pub fn parse_text(value: &str, formats: &[String]) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    formats.iter().find_map(|format| {
        NaiveDate::parse_from_str(value, format)
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(value, format)
                    .ok()
                    .map(|dt| dt.date())
            })
    })
}

/// Resolves any raw cell into a date
pub fn parse_value(value: &RawValue, formats: &[String]) -> Option<NaiveDate> {
    match value {
        RawValue::Date(d) => Some(*d),
        RawValue::DateTime(dt) => Some(dt.date()),
        RawValue::Number(n) => from_excel_serial(*n),
        RawValue::Text(s) => parse_text(s, formats),
        RawValue::Empty | RawValue::Bool(_) => None,
    }
}
