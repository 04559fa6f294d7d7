//! CSV tokenizer and field typer for uploaded vital-sign files.

use chrono::{DateTime, SecondsFormat, Utc};
use vitals_core::{is_reserved_field, FieldValue, HealthRecord, RecordIdGenerator};

/// Header row plus raw string cells, positionally aligned with the header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Split raw file text into a header and data rows.
///
/// The first non-empty line is the header. Blank lines are dropped and short
/// rows keep only the cells they have.
pub fn tokenize(text: &str) -> CsvTable {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let Some(header_line) = lines.next() else {
        return CsvTable::default();
    };

    let table = CsvTable {
        headers: split_line(header_line),
        rows: lines.map(split_line).collect(),
    };

    tracing::debug!(
        columns = table.headers.len(),
        rows = table.rows.len(),
        "tokenized upload"
    );

    table
}

fn split_line(line: &str) -> Vec<String> {
    line.split(',').map(|cell| cell.trim().to_string()).collect()
}

/// Build one `HealthRecord` per row.
///
/// When the first header is `timestamp` (any ASCII case) its cell supplies the
/// record timestamp; otherwise, or when that cell is missing, the upload
/// instant is used. Empty cells are omitted. Rows stamped with the upload
/// instant share one timestamp, so merging folds them into a single record.
pub fn type_rows(
    table: &CsvTable,
    uploaded_at: DateTime<Utc>,
    ids: &mut dyn RecordIdGenerator,
) -> Vec<HealthRecord> {
    let has_timestamp_column = table
        .headers
        .first()
        .is_some_and(|name| name.eq_ignore_ascii_case("timestamp"));
    let upload_stamp = upload_timestamp(uploaded_at);
    let first_field = usize::from(has_timestamp_column);

    table
        .rows
        .iter()
        .map(|row| {
            let timestamp = if has_timestamp_column {
                row.first()
                    .filter(|cell| !cell.is_empty())
                    .cloned()
                    .unwrap_or_else(|| upload_stamp.clone())
            } else {
                upload_stamp.clone()
            };

            let mut record = HealthRecord::new(ids.next_id(), timestamp);
            for (header, raw) in table.headers.iter().zip(row).skip(first_field) {
                if header.is_empty() || is_reserved_field(header) {
                    continue;
                }
                if let Some(value) = coerce_field(raw) {
                    record.insert(header.clone(), value);
                }
            }
            record
        })
        .collect()
}

/// Coerce a raw cell. `None` for empty cells.
pub fn coerce_field(raw: &str) -> Option<FieldValue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.parse::<f64>() {
        Ok(number) if number.is_finite() => Some(FieldValue::Number(number)),
        _ => Some(FieldValue::Text(trimmed.to_string())),
    }
}

/// Tokenize and type an uploaded file in one step.
pub fn parse_upload(
    text: &str,
    uploaded_at: DateTime<Utc>,
    ids: &mut dyn RecordIdGenerator,
) -> Vec<HealthRecord> {
    type_rows(&tokenize(text), uploaded_at, ids)
}

pub(crate) fn upload_timestamp(uploaded_at: DateTime<Utc>) -> String {
    uploaded_at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
