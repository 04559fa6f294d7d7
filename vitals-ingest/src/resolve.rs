//! Column resolution across header naming conventions.

use vitals_core::HealthRecord;

/// First synonym, in priority order, present as a field on `record`.
pub fn resolve_in_record<'a>(record: &HealthRecord, synonyms: &[&'a str]) -> Option<&'a str> {
    synonyms
        .iter()
        .copied()
        .find(|name| record.has_field(name))
}

/// Resolve which column holds a vital for a whole series.
///
/// The representative record is the first one carrying any synonym, so a
/// series that starts with rows from an upload lacking this vital still
/// resolves. Only field names are checked, not value types.
pub fn resolve_column<'a>(series: &[HealthRecord], synonyms: &[&'a str]) -> Option<&'a str> {
    series
        .iter()
        .find_map(|record| resolve_in_record(record, synonyms))
}
