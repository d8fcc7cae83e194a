//! Record normalization
//!
//! Turns a [`RawRow`] into a [`NormalizedRecord`] with canonical key fields,
//! exact decimal hours and cleaned optional fields. Failures are returned as
//! [`ValidationError`] so the caller can collect them per row.

pub mod dates;

use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;

use crate::config::{ColumnsConfig, NormalizeConfig};
use crate::domain::{NaturalKey, NormalizedRecord, RawRow, RawValue, SourceRef, ValidationError};

/// Status markers that carry no information
pub const NON_MEANINGFUL_STATUS: &[&str] = &["", "0", "n", "no", "none", "na", "n/a", "-", "--"];

/// Canonicalizes raw rows
#[derive(Debug, Clone)]
pub struct Normalizer {
    columns: ColumnsConfig,
    ceiling: Decimal,
    scale: u32,
    date_formats: Vec<String>,
}

impl Normalizer {
    pub fn new(columns: &ColumnsConfig, rules: &NormalizeConfig) -> Self {
        Self {
            columns: columns.clone(),
            ceiling: rules.daily_hour_ceiling,
            scale: rules.hours_scale,
            date_formats: rules.date_formats.clone(),
        }
    }

    /// Normalizes one row
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if a key component is blank, the date
    /// cannot be parsed, or the hours are not a number within range.
    pub fn normalize(
        &self,
        row: &RawRow,
        source: &SourceRef,
    ) -> Result<NormalizedRecord, ValidationError> {
        let date_cell = row.get(&self.columns.date);
        let employee_name = self.required_text(row, &self.columns.employee)?;
        let project_id = self.required_text(row, &self.columns.project)?;
        if date_cell.is_blank() {
            return Err(ValidationError::MissingKey {
                field: self.columns.date.clone(),
            });
        }

        let date = dates::parse_value(date_cell, &self.date_formats).ok_or_else(|| {
            ValidationError::UnparseableDate {
                value: date_cell.as_text(),
            }
        })?;

        let key = NaturalKey::new(date, &employee_name, &project_id).ok_or_else(|| {
            ValidationError::MissingKey {
                field: self.columns.employee.clone(),
            }
        })?;

        let working_hours = self.hours(row)?;

        Ok(NormalizedRecord {
            key,
            employee_name,
            project_id,
            working_hours,
            role: optional_text(row.get(&self.columns.role)),
            location: optional_text(row.get(&self.columns.location)),
            status: clean_status(&row.get(&self.columns.status).as_text()),
            source: source.id.clone(),
            extracted_at: source.extracted_at,
            row_number: row.row_number,
        })
    }

    fn required_text(&self, row: &RawRow, column: &str) -> Result<String, ValidationError> {
        let value = row.get(column);
        if value.is_blank() {
            return Err(ValidationError::MissingKey {
                field: column.to_string(),
            });
        }
        Ok(value.as_text().trim().to_string())
    }

    fn hours(&self, row: &RawRow) -> Result<Decimal, ValidationError> {
        let primary = row.get(&self.columns.hours);
        let (column, cell) = if primary.is_blank() {
            (
                &self.columns.hours_converted,
                row.get(&self.columns.hours_converted),
            )
        } else {
            (&self.columns.hours, primary)
        };

        let value = match parse_decimal(cell) {
            Some(value) => value,
            None if cell.is_blank() => Decimal::ZERO,
            None if is_numeric(cell) => {
                return Err(ValidationError::OutOfRange {
                    value: cell.as_text(),
                    ceiling: self.ceiling.normalize().to_string(),
                })
            }
            None => {
                return Err(ValidationError::InvalidNumber {
                    field: column.clone(),
                    value: cell.as_text(),
                })
            }
        };

        if value < Decimal::ZERO || value > self.ceiling {
            return Err(ValidationError::OutOfRange {
                value: value.normalize().to_string(),
                ceiling: self.ceiling.normalize().to_string(),
            });
        }

        Ok(value.round_dp_with_strategy(self.scale, RoundingStrategy::MidpointAwayFromZero))
    }
}

/// Reads a numeric cell or numeric text as an exact decimal
///
/// Text may use `,` as the decimal separator.
pub fn parse_decimal(value: &RawValue) -> Option<Decimal> {
    match value {
        RawValue::Number(n) if n.is_finite() => Decimal::from_str(&n.to_string()).ok(),
        RawValue::Text(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            Decimal::from_str(&s.replace(',', ".")).ok()
        }
        _ => None,
    }
}

/// True for a plain finite number that a decimal cannot hold
fn is_numeric(value: &RawValue) -> bool {
    match value {
        RawValue::Number(n) => n.is_finite(),
        RawValue::Text(s) => {
            let s = s.trim().replace(',', ".");
            s.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
                && s.parse::<f64>().map(f64::is_finite).unwrap_or(false)
        }
        _ => false,
    }
}

/// Trims free text, mapping blanks to `None`
fn optional_text(value: &RawValue) -> Option<String> {
    let text = value.as_text();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Cleans a status cell
///
/// Line breaks and tabs are removed, surrounding whitespace is trimmed, and
/// non-meaningful markers map to `None`.
pub fn clean_status(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if NON_MEANINGFUL_STATUS.contains(&cleaned.to_lowercase().as_str()) {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SourceId;
    use chrono::{NaiveDate, TimeZone, Utc};
    use test_case::test_case;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn normalizer() -> Normalizer {
        Normalizer::new(&ColumnsConfig::default(), &NormalizeConfig::default())
    }

    fn source() -> SourceRef {
        SourceRef {
            id: SourceId::new("team/jane.xlsx").unwrap(),
            extracted_at: Utc.with_ymd_and_hms(2025, 1, 31, 12, 0, 0).unwrap(),
        }
    }

    fn row() -> RawRow {
        RawRow::new(5)
            .with("Date", RawValue::Text("2025-01-06".into()))
            .with("Employee Name", RawValue::Text(" Jane Doe ".into()))
            .with("Project ID", RawValue::Number(1042.0))
            .with("Employee Role", RawValue::Text("Engineer".into()))
            .with("Office Location", RawValue::Text("   ".into()))
            .with("Working Hours", RawValue::Number(7.5))
            .with("Status", RawValue::Text("Done\n".into()))
    }

    #[test]
    fn test_normalize_complete_row() {
        let record = normalizer().normalize(&row(), &source()).unwrap();

        assert_eq!(record.key.to_string(), "2025-01-06|jane doe|1042");
        assert_eq!(record.employee_name, "Jane Doe");
        assert_eq!(record.project_id, "1042");
        assert_eq!(record.working_hours, dec("7.50"));
        assert_eq!(record.role.as_deref(), Some("Engineer"));
        assert_eq!(record.location, None);
        assert_eq!(record.status.as_deref(), Some("Done"));
        assert_eq!(record.row_number, 5);
        assert_eq!(record.source.as_str(), "team/jane.xlsx");
    }

    #[test_case("Date" ; "date")]
    #[test_case("Employee Name" ; "employee")]
    #[test_case("Project ID" ; "project")]
    fn test_blank_key_component_is_missing_key(column: &str) {
        let row = row().with(column, RawValue::Text("  ".into()));
        let err = normalizer().normalize(&row, &source()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingKey {
                field: column.to_string()
            }
        );
    }

    #[test]
    fn test_absent_key_column_is_missing_key() {
        let mut row = row();
        row.fields.remove("Employee Name");
        let err = normalizer().normalize(&row, &source()).unwrap_err();
        assert!(matches!(err, ValidationError::MissingKey { .. }));
    }

    #[test]
    fn test_unparseable_date() {
        let row = row().with("Date", RawValue::Text("sometime".into()));
        let err = normalizer().normalize(&row, &source()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnparseableDate {
                value: "sometime".into()
            }
        );
    }

    #[test]
    fn test_serial_date() {
        let row = row().with("Date", RawValue::Number(45663.0));
        let record = normalizer().normalize(&row, &source()).unwrap();
        assert_eq!(record.key.date, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
    }

    #[test_case(RawValue::Text("7,25".into()), dec("7.25") ; "comma separator")]
    #[test_case(RawValue::Text(" 8 ".into()), dec("8") ; "integer text")]
    #[test_case(RawValue::Number(0.1 + 0.2), dec("0.30") ; "float noise rounded")]
    #[test_case(RawValue::Number(2.675), dec("2.68") ; "midpoint away from zero")]
    #[test_case(RawValue::Number(24.0), dec("24") ; "ceiling inclusive")]
    fn test_hours_parsing(cell: RawValue, expected: Decimal) {
        let row = row().with("Working Hours", cell);
        let record = normalizer().normalize(&row, &source()).unwrap();
        assert_eq!(record.working_hours, expected);
    }

    #[test]
    fn test_hours_fall_back_to_converted_column() {
        let row = row()
            .with("Working Hours", RawValue::Empty)
            .with("Working Hours Converted", RawValue::Number(6.0));
        let record = normalizer().normalize(&row, &source()).unwrap();
        assert_eq!(record.working_hours, dec("6"));
    }

    #[test]
    fn test_hours_default_to_zero() {
        let row = row().with("Working Hours", RawValue::Empty);
        let record = normalizer().normalize(&row, &source()).unwrap();
        assert_eq!(record.working_hours, Decimal::ZERO);
    }

    #[test_case(RawValue::Number(24.5) ; "above ceiling")]
    #[test_case(RawValue::Number(-1.0) ; "negative")]
    #[test_case(RawValue::Text("-0.01".into()) ; "slightly negative")]
    fn test_hours_out_of_range(cell: RawValue) {
        let row = row().with("Working Hours", cell);
        let err = normalizer().normalize(&row, &source()).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { .. }));
    }

    #[test_case(RawValue::Number(1e30) ; "huge number")]
    #[test_case(RawValue::Number(-1e30) ; "huge negative number")]
    #[test_case(RawValue::Text("12345678901234567890123456789012".into()) ; "32 digit text")]
    fn test_hours_beyond_decimal_range_are_out_of_range(cell: RawValue) {
        let row = row().with("Working Hours", cell);
        let err = normalizer().normalize(&row, &source()).unwrap_err();
        assert!(matches!(err, ValidationError::OutOfRange { ref ceiling, .. } if ceiling == "24"));
    }

    #[test_case("eight" ; "word")]
    #[test_case("1.2.3" ; "two separators")]
    fn test_hours_text_is_invalid_number(text: &str) {
        let row = row().with("Working Hours", RawValue::Text(text.into()));
        let err = normalizer().normalize(&row, &source()).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidNumber { .. }));
    }

    #[test]
    fn test_hours_not_a_number() {
        let row = row().with("Working Hours", RawValue::Text("eight".into()));
        let err = normalizer().normalize(&row, &source()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidNumber {
                field: "Working Hours".into(),
                value: "eight".into()
            }
        );
    }

    #[test_case("N/A", None ; "na marker")]
    #[test_case(" -- ", None ; "dashes")]
    #[test_case("0", None ; "zero")]
    #[test_case("", None ; "empty")]
    #[test_case("\tPending\r\n", Some("Pending") ; "control characters")]
    #[test_case("To Review", Some("To Review") ; "kept verbatim")]
    fn test_clean_status(raw: &str, expected: Option<&str>) {
        assert_eq!(clean_status(raw).as_deref(), expected);
    }
}
