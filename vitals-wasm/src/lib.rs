//! Bridge WASM <-> JavaScript trung lập framework cho dashboard chỉ số sống.

use std::cell::RefCell;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, Serializer};
use vitals_core::{DashboardConfig, HealthRecord, Patient, SequentialIds, Vital, VitalsError};
use vitals_ingest::{
    aggregate, build_summary_request, ingest_csv, is_csv_file, narrative_or_fallback,
    SummaryError, SummaryResponse,
};
use wasm_bindgen::prelude::*;

thread_local! {
    /// Bộ đếm định danh dùng chung cho cả phiên, mọi bệnh nhân.
    static SESSION_IDS: RefCell<SequentialIds> = RefCell::new(SequentialIds::default());
}

#[derive(Deserialize)]
struct JsDashboardConfig {
    #[serde(default)]
    summary_record_limit: Option<usize>,
    #[serde(default)]
    summary_model: Option<String>,
    #[serde(default)]
    summary_max_tokens: Option<u32>,
    #[serde(default)]
    chart_window: Option<usize>,
    #[serde(default)]
    table_window: Option<usize>,
}

impl From<JsDashboardConfig> for DashboardConfig {
    fn from(cfg: JsDashboardConfig) -> Self {
        let mut base = DashboardConfig::default();
        if let Some(limit) = cfg.summary_record_limit {
            base.summary_record_limit = limit;
        }
        if let Some(model) = cfg.summary_model {
            base.summary_model = model;
        }
        if let Some(tokens) = cfg.summary_max_tokens {
            base.summary_max_tokens = tokens;
        }
        if let Some(window) = cfg.chart_window {
            base.chart_window = window;
        }
        if let Some(window) = cfg.table_window {
            base.table_window = window;
        }
        base
    }
}

/// Phân tích file CSV thành các bản ghi, chưa gộp vào chuỗi nào.
///
/// `id_seed` chỉ nâng bộ đếm của phiên, không đặt lại nó.
#[wasm_bindgen]
pub fn parse_upload(
    csv_text: &str,
    uploaded_at: &str,
    id_seed: Option<u32>,
) -> Result<JsValue, JsValue> {
    init_panic_hook();

    let uploaded_at = parse_upload_instant(uploaded_at)?;
    to_js(&parse_records(csv_text, uploaded_at, id_seed.map(u64::from)))
}

/// Gộp file tải lên vào chuỗi của bệnh nhân đang chọn, trả về bệnh nhân đã cập nhật.
///
/// `patient` là `null` khi chưa chọn bệnh nhân; khi đó từ chối trước khi đọc file.
#[wasm_bindgen]
pub fn ingest_upload(
    patient: JsValue,
    file_name: &str,
    csv_text: &str,
    uploaded_at: &str,
) -> Result<JsValue, JsValue> {
    init_panic_hook();

    if patient.is_null() || patient.is_undefined() {
        return Err(js_error(VitalsError::NoPatientSelected));
    }
    if !is_csv_file(file_name) {
        return Err(js_error(VitalsError::UnsupportedFile(file_name.to_string())));
    }

    let mut patient: Patient = from_value(patient)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được bệnh nhân: {err}")))?;
    let uploaded_at = parse_upload_instant(uploaded_at)?;

    ingest_into(&mut patient, csv_text, uploaded_at);
    to_js(&patient)
}

#[wasm_bindgen]
pub fn series_stats(series: JsValue) -> Result<JsValue, JsValue> {
    let series = read_series(series)?;
    to_js(&aggregate(&series))
}

/// Dữ liệu biểu đồ; `vital` là `heart_rate`, `systolic`, `diastolic` hoặc `oxygen_saturation`.
#[wasm_bindgen]
pub fn vital_trend(
    series: JsValue,
    vital: &str,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    let series = read_series(series)?;
    let vital: Vital = vital.parse().map_err(js_error)?;
    let cfg = read_config(config)?;
    to_js(&vitals_ingest::vital_trend(&series, vital, cfg.chart_window))
}

/// Payload JSON gửi dịch vụ tóm tắt.
#[wasm_bindgen]
pub fn summary_request(series: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    let series = read_series(series)?;
    if series.is_empty() {
        return Err(js_error(VitalsError::NoData));
    }
    let cfg = read_config(config)?;
    let request = build_summary_request(&series, &cfg).map_err(js_error)?;
    to_js(&request)
}

/// Văn bản hiển thị từ phản hồi tóm tắt; phản hồi lỗi trả về câu thông báo cố định.
#[wasm_bindgen]
pub fn read_summary_response(response: JsValue) -> String {
    let result = from_value::<SummaryResponse>(response)
        .map(|response| response.narrative())
        .map_err(|err| SummaryError::Malformed(err.to_string()));
    narrative_or_fallback(result)
}

fn with_session_ids<R>(
    existing: &[HealthRecord],
    f: impl FnOnce(&mut SequentialIds) -> R,
) -> R {
    SESSION_IDS.with(|ids| {
        let mut ids = ids.borrow_mut();
        ids.skip_past(existing);
        f(&mut *ids)
    })
}

fn parse_records(
    csv_text: &str,
    uploaded_at: DateTime<Utc>,
    id_seed: Option<u64>,
) -> Vec<HealthRecord> {
    with_session_ids(&[], |ids| {
        if let Some(seed) = id_seed {
            ids.advance_to(seed);
        }
        vitals_ingest::parse_upload(csv_text, uploaded_at, ids)
    })
}

fn ingest_into(patient: &mut Patient, csv_text: &str, uploaded_at: DateTime<Utc>) {
    patient.series = with_session_ids(&patient.series, |ids| {
        ingest_csv(&patient.series, csv_text, uploaded_at, ids)
    });
}

fn init_panic_hook() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

fn read_series(series: JsValue) -> Result<Vec<HealthRecord>, JsValue> {
    from_value::<Vec<HealthRecord>>(series)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được chuỗi dữ liệu: {err}")))
}

fn read_config(config: Option<JsValue>) -> Result<DashboardConfig, JsValue> {
    match config {
        Some(js_cfg) if !js_cfg.is_null() && !js_cfg.is_undefined() => {
            let cfg: JsDashboardConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
            Ok(DashboardConfig::from(cfg))
        }
        _ => Ok(DashboardConfig::default()),
    }
}

fn parse_upload_instant(value: &str) -> Result<DateTime<Utc>, JsValue> {
    DateTime::parse_from_rfc3339(value)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| js_error(VitalsError::Parse(format!("thời điểm tải lên {value}: {err}"))))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|err| JsValue::from_str(&format!("Không serialize kết quả: {err}")))
}

fn js_error(err: VitalsError) -> JsValue {
    JsValue::from_str(&format_vitals_error(err))
}

fn format_vitals_error(err: VitalsError) -> String {
    format!("Vitals error: {err}")
}
