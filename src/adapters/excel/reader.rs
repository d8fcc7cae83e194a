//! Sheet reading with calamine
//!
//! These functions are blocking and are run on the blocking thread pool by
//! [`ExcelExtractor`](super::ExcelExtractor).

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::config::ColumnsConfig;
use crate::core::normalize::dates::from_excel_serial;
use crate::domain::{ExtractionError, RawRow, RawValue};

/// Reads the timesheet sheet of one workbook
///
/// The first row of the sheet is the header. Header names matching a
/// configured column (ignoring case and surrounding whitespace) are stored
/// under the configured name; other headers are kept trimmed. Fully blank
/// rows are skipped.
pub fn read_sheet(
    path: &Path,
    sheet: &str,
    columns: &ColumnsConfig,
) -> Result<Vec<RawRow>, ExtractionError> {
    let source_id = path.display().to_string();
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ExtractionError::Unreadable(format!("{source_id}: {e}")))?;

    let sheet_name = workbook
        .sheet_names()
        .into_iter()
        .find(|name| name.trim().eq_ignore_ascii_case(sheet.trim()))
        .ok_or_else(|| ExtractionError::MissingSheet {
            source_id: source_id.clone(),
            sheet: sheet.to_string(),
        })?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ExtractionError::Unreadable(format!("{source_id}: sheet '{sheet_name}': {e}")))?;

    // Row numbers are 1-based sheet rows, so they match what users see
    let first_row = range.start().map(|(row, _)| row as usize + 1).unwrap_or(1);
    rows_from_cells(&source_id, first_row, range.rows(), columns)
}

/// Turns a header row plus data rows into [`RawRow`]s
pub(crate) fn rows_from_cells<'a>(
    source_id: &str,
    first_row: usize,
    mut rows: impl Iterator<Item = &'a [Data]>,
    columns: &ColumnsConfig,
) -> Result<Vec<RawRow>, ExtractionError> {
    let headers: Vec<Option<String>> = rows
        .next()
        .map(|row| row.iter().map(|cell| header_name(cell, columns)).collect())
        .unwrap_or_default();

    let missing: Vec<&str> = columns
        .required()
        .into_iter()
        .filter(|required| !headers.iter().flatten().any(|h| h == required))
        .collect();
    if !missing.is_empty() {
        return Err(ExtractionError::MissingColumns {
            source_id: source_id.to_string(),
            columns: missing.join(", "),
        });
    }

    let mut result = Vec::new();
    for (offset, cells) in rows.enumerate() {
        let mut row = RawRow::new(first_row + offset + 1);
        for (header, cell) in headers.iter().zip(cells) {
            if let Some(header) = header {
                row.fields.insert(header.clone(), to_raw_value(cell));
            }
        }
        if !row.is_blank() {
            result.push(row);
        }
    }

    tracing::debug!(source = source_id, rows = result.len(), "Read sheet");
    Ok(result)
}

fn header_name(cell: &Data, columns: &ColumnsConfig) -> Option<String> {
    let text = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => return None,
        other => other.to_string().trim().to_string(),
    };
    if text.is_empty() {
        return None;
    }
    let canonical = columns
        .all()
        .into_iter()
        .find(|configured| configured.trim().eq_ignore_ascii_case(&text));
    Some(canonical.map(str::to_string).unwrap_or(text))
}

/// Maps a calamine cell onto a [`RawValue`]
///
/// Date cells become dates when they carry a valid serial; anything else
/// keeps its numeric serial. Error cells become their `#` text so that
/// normalization reports them instead of reading them as empty.
pub(crate) fn to_raw_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Empty,
        Data::String(s) => RawValue::Text(s.clone()),
        Data::Float(n) => RawValue::Number(*n),
        Data::Int(n) => RawValue::Number(*n as f64),
        Data::Bool(b) => RawValue::Bool(*b),
        Data::Error(e) => RawValue::Text(format!("#{e:?}")),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            from_excel_serial(serial)
                .map(RawValue::Date)
                .unwrap_or(RawValue::Number(serial))
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => RawValue::Text(s.clone()),
    }
}
