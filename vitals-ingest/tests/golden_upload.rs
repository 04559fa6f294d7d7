use std::fs;

use chrono::{TimeZone, Utc};
use serde_json::Value;
use vitals_core::{DashboardConfig, FieldValue, NewPatient, RecordId, SequentialIds};
use vitals_ingest::{aggregate, ingest_csv, Dashboard};

fn fixture_path(name: &str) -> String {
    format!("{}/tests/data/{name}", env!("CARGO_MANIFEST_DIR"))
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("Không đọc được file mẫu")
}

#[test]
fn successive_uploads_match_golden_series_and_stats() {
    let uploaded_at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let mut ids = SequentialIds::default();

    let series = ingest_csv(&[], &read_fixture("complete_upload.csv"), uploaded_at, &mut ids);
    let series = ingest_csv(&series, &read_fixture("heart_rate_only.csv"), uploaded_at, &mut ids);

    let actual_series = serde_json::to_value(&series).expect("Không serialize chuỗi dữ liệu");
    let expected_series: Value =
        serde_json::from_str(&read_fixture("merged_series.json")).expect("Golden không hợp lệ");
    assert_eq!(actual_series, expected_series);

    let actual_stats = serde_json::to_value(aggregate(&series)).expect("Không serialize thống kê");
    let expected_stats: Value =
        serde_json::from_str(&read_fixture("merged_stats.json")).expect("Golden không hợp lệ");
    assert_eq!(actual_stats, expected_stats);
}

#[test]
fn dashboard_upload_reaches_same_state() {
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut dashboard = Dashboard::new(DashboardConfig::default());
    let id = dashboard.add_patient(NewPatient::named("Nguyen Van A"), created);
    dashboard.select_patient(id).expect("Không chọn được bệnh nhân");

    dashboard
        .upload("complete_upload.csv", &read_fixture("complete_upload.csv"), created)
        .expect("Upload thất bại");
    let report = dashboard
        .upload("heart_rate_only.csv", &read_fixture("heart_rate_only.csv"), created)
        .expect("Upload thất bại");

    assert_eq!(report.parsed, 2);
    assert_eq!(report.updated, 1);
    assert_eq!(report.appended, 1);
    assert_eq!(report.total_records, 4);

    let stats = serde_json::to_value(dashboard.stats().expect("Thiếu thống kê")).unwrap();
    let expected: Value = serde_json::from_str(&read_fixture("merged_stats.json")).unwrap();
    assert_eq!(stats, expected);
}

#[test]
fn reapplying_an_upload_changes_nothing() {
    let uploaded_at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let mut ids = SequentialIds::default();
    let upload = read_fixture("complete_upload.csv");

    let once = ingest_csv(&[], &upload, uploaded_at, &mut ids);
    let twice = ingest_csv(&once, &upload, uploaded_at, &mut ids);

    assert_eq!(once, twice);
}

#[test]
fn rows_without_timestamp_column_fold_into_one_record() {
    let uploaded_at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let mut ids = SequentialIds::default();

    let series = ingest_csv(&[], "HR\n70\n71\n72\n", uploaded_at, &mut ids);

    assert_eq!(series.len(), 1);
    assert_eq!(series[0].id, RecordId(1));
    assert_eq!(series[0].timestamp, "2024-01-02T00:00:00.000Z");
    assert_eq!(series[0].get("HR"), Some(&FieldValue::Number(72.0)));
}
