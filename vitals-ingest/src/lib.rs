//! CSV ingestion, timestamp merge and statistics for patient vital-sign series.

pub mod csv;
pub mod dashboard;
pub mod merge;
pub mod resolve;
pub mod stats;
pub mod summary;
pub mod trend;

use chrono::{DateTime, Utc};
use vitals_core::{HealthRecord, RecordIdGenerator};

pub use csv::{coerce_field, parse_upload, tokenize, type_rows, CsvTable};
pub use dashboard::{is_csv_file, AnalysisTicket, Dashboard, UploadReport};
pub use merge::{merge_series, merge_with_report, parse_instant, sort_by_instant, MergeReport};
pub use resolve::{resolve_column, resolve_in_record};
pub use stats::{aggregate, vital_stats};
pub use summary::{
    build_summary_request, narrative_or_fallback, read_summary_response, summary_records,
    SummaryError, SummaryMessage, SummaryProvider, SummaryRequest, SummaryResponse,
    SUMMARY_FALLBACK,
};
pub use trend::{present_trends, vital_trend};

/// Parse an uploaded CSV and merge it into `existing`, returning the new series.
pub fn ingest_csv(
    existing: &[HealthRecord],
    text: &str,
    uploaded_at: DateTime<Utc>,
    ids: &mut dyn RecordIdGenerator,
) -> Vec<HealthRecord> {
    merge_series(existing, parse_upload(text, uploaded_at, ids))
}
