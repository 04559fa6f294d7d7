//! Timestamp-keyed merge of a parsed batch into an existing series.

use std::collections::{hash_map::Entry, HashMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use vitals_core::HealthRecord;

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// How many batch records landed on an existing timestamp vs. were appended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    pub updated: usize,
    pub appended: usize,
}

/// Merge `batch` into a copy of `existing`, keyed by exact timestamp string.
pub fn merge_series(existing: &[HealthRecord], batch: Vec<HealthRecord>) -> Vec<HealthRecord> {
    merge_with_report(existing, batch).0
}

/// Same as [`merge_series`], also reporting update/append counts.
///
/// On a timestamp collision the incoming fields overwrite shared names, fields
/// only on the existing record survive, and the existing record id is kept.
pub fn merge_with_report(
    existing: &[HealthRecord],
    batch: Vec<HealthRecord>,
) -> (Vec<HealthRecord>, MergeReport) {
    let mut merged = existing.to_vec();
    let mut positions: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(index, record)| (record.timestamp.clone(), index))
        .collect();
    let mut report = MergeReport::default();

    for incoming in batch {
        match positions.entry(incoming.timestamp.clone()) {
            Entry::Occupied(entry) => {
                merged[*entry.get()].fields.extend(incoming.fields);
                report.updated += 1;
            }
            Entry::Vacant(entry) => {
                entry.insert(merged.len());
                merged.push(incoming);
                report.appended += 1;
            }
        }
    }

    sort_by_instant(&mut merged);

    tracing::debug!(
        existing = existing.len(),
        updated = report.updated,
        appended = report.appended,
        total = merged.len(),
        "merged batch"
    );

    (merged, report)
}

/// Stable ascending sort by calendar instant. Unparseable timestamps go last.
pub fn sort_by_instant(series: &mut [HealthRecord]) {
    series.sort_by_cached_key(|record| match parse_instant(&record.timestamp) {
        Some(instant) => (false, Some(instant)),
        None => (true, None),
    });
}

/// Read a timestamp string as a UTC instant. Naive forms are taken as UTC.
pub fn parse_instant(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
