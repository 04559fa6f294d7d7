//! Mô hình dữ liệu lõi cho dashboard chỉ số sống: bệnh nhân, bản ghi, thống kê.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Tên trường dành riêng, không bao giờ nằm trong `HealthRecord::fields`.
pub const RESERVED_FIELDS: [&str; 2] = ["id", "timestamp"];

/// Nhãn hiển thị khi không có giá trị trung bình.
pub const NOT_AVAILABLE: &str = "N/A";

/// Cấu hình dashboard: giới hạn cửa sổ hiển thị và tham số gọi tóm tắt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Số bản ghi tối đa gửi kèm yêu cầu tóm tắt.
    pub summary_record_limit: usize,
    /// Model định danh gửi cho dịch vụ sinh văn bản.
    pub summary_model: String,
    /// Ngân sách token cho phản hồi tóm tắt.
    pub summary_max_tokens: u32,
    /// Số bản ghi đầu tiên dùng cho biểu đồ.
    pub chart_window: usize,
    /// Số bản ghi đầu tiên hiển thị trong bảng.
    pub table_window: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            summary_record_limit: 50,
            summary_model: "claude-sonnet-4-20250514".to_string(),
            summary_max_tokens: 1000,
            chart_window: 30,
            table_window: 50,
        }
    }
}

/// Giá trị một ô dữ liệu: số hoặc chuỗi.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(value) => Some(*value),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Number(_) => None,
            FieldValue::Text(text) => Some(text),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(value) => write!(f, "{value}"),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

/// Định danh bản ghi, duy nhất trong một phiên làm việc.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Một dòng dữ liệu sức khỏe. Tập trường thay đổi theo file tải lên.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthRecord {
    pub id: RecordId,
    pub timestamp: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl HealthRecord {
    pub fn new(id: RecordId, timestamp: impl Into<String>) -> Self {
        Self {
            id,
            timestamp: timestamp.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Gắn thêm trường, bỏ qua tên dành riêng. Trả về `false` nếu bị bỏ qua.
    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) -> bool {
        let name = name.into();
        if is_reserved_field(&name) {
            return false;
        }
        self.fields.insert(name, value);
        true
    }

    /// Dạng builder của [`HealthRecord::insert`], tiện cho test và fixture.
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn numeric(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_number)
    }
}

pub fn is_reserved_field(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// Nguồn cấp định danh bản ghi, được tiêm vào bước gán kiểu.
pub trait RecordIdGenerator {
    fn next_id(&mut self) -> RecordId;
}

/// Bộ đếm tăng dần với hạt giống tường minh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn new(seed: u64) -> Self {
        Self { next: seed }
    }

    /// Tiếp tục sau định danh lớn nhất đã có trong chuỗi.
    pub fn after(series: &[HealthRecord]) -> Self {
        let seed = series
            .iter()
            .map(|record| record.id.0)
            .max()
            .map_or(1, |max| max.saturating_add(1));
        Self::new(seed)
    }

    /// Nâng bộ đếm lên ít nhất `floor`; không bao giờ lùi lại.
    pub fn advance_to(&mut self, floor: u64) {
        self.next = self.next.max(floor);
    }

    /// Bỏ qua mọi định danh đã có trong `series`.
    pub fn skip_past(&mut self, series: &[HealthRecord]) {
        self.advance_to(Self::after(series).next);
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new(1)
    }
}

impl RecordIdGenerator for SequentialIds {
    fn next_id(&mut self) -> RecordId {
        let id = RecordId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Định danh bệnh nhân trong roster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct PatientId(pub u64);

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dữ liệu form tạo bệnh nhân mới.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NewPatient {
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub medical_id: Option<String>,
}

impl NewPatient {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Bệnh nhân cùng chuỗi dữ liệu sức khỏe thuộc sở hữu riêng.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: PatientId,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub medical_id: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub series: Vec<HealthRecord>,
}

impl Patient {
    /// Khởi tạo bệnh nhân với chuỗi dữ liệu rỗng.
    pub fn new(id: PatientId, form: NewPatient, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: form.name,
            age: form.age,
            gender: form.gender,
            email: form.email,
            phone: form.phone,
            medical_id: form.medical_id,
            created_at,
            series: Vec::new(),
        }
    }
}

/// Các chỉ số sống được nhận diện.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Vital {
    HeartRate,
    Systolic,
    Diastolic,
    OxygenSaturation,
}

impl Vital {
    pub const ALL: [Vital; 4] = [
        Vital::HeartRate,
        Vital::Systolic,
        Vital::Diastolic,
        Vital::OxygenSaturation,
    ];

    /// Các cách viết tên cột được chấp nhận, theo thứ tự ưu tiên.
    pub fn synonyms(self) -> &'static [&'static str] {
        match self {
            Vital::HeartRate => &["HR", "hr", "Heart Rate", "HeartRate"],
            Vital::Systolic => &["BP_Systolic", "SBP", "BP Systolic"],
            Vital::Diastolic => &["BP_Diastolic", "DBP", "BP Diastolic"],
            Vital::OxygenSaturation => &["SPO2", "spo2", "Oxygen Saturation"],
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Vital::HeartRate => "heart_rate",
            Vital::Systolic => "systolic",
            Vital::Diastolic => "diastolic",
            Vital::OxygenSaturation => "oxygen_saturation",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Vital::HeartRate => "Heart rate",
            Vital::Systolic => "Systolic pressure",
            Vital::Diastolic => "Diastolic pressure",
            Vital::OxygenSaturation => "Oxygen saturation",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Vital::HeartRate => "bpm",
            Vital::Systolic | Vital::Diastolic => "mmHg",
            Vital::OxygenSaturation => "%",
        }
    }
}

impl FromStr for Vital {
    type Err = VitalsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Vital::ALL
            .into_iter()
            .find(|vital| vital.key() == value)
            .ok_or_else(|| VitalsError::Parse(format!("Chỉ số sống không hợp lệ: {value}")))
    }
}

/// Giá trị trung bình, làm tròn một chữ số thập phân.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Average {
    Value(f64),
    NotAvailable,
}

impl Average {
    /// Trung bình cộng; danh sách rỗng cho `NotAvailable`.
    pub fn of(values: &[f64]) -> Self {
        if values.is_empty() {
            return Average::NotAvailable;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        Average::Value((mean * 10.0).round() / 10.0)
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Average::Value(value) => Some(value),
            Average::NotAvailable => None,
        }
    }
}

impl fmt::Display for Average {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Average::Value(value) => write!(f, "{value:.1}"),
            Average::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl Serialize for Average {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Average::Value(value) => serializer.serialize_f64(*value),
            Average::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Average {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(Average::Value(value)),
            Raw::Text(text) if text == NOT_AVAILABLE => Ok(Average::NotAvailable),
            Raw::Text(other) => Err(serde::de::Error::custom(format!(
                "giá trị trung bình không hợp lệ: {other}"
            ))),
        }
    }
}

/// Thống kê một chỉ số sống trên toàn chuỗi.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VitalStats {
    pub vital: Vital,
    pub column: Option<String>,
    pub average: Average,
    pub count: usize,
}

impl VitalStats {
    pub fn unavailable(vital: Vital) -> Self {
        Self {
            vital,
            column: None,
            average: Average::NotAvailable,
            count: 0,
        }
    }
}

/// Kết quả tổng hợp hiển thị trên thẻ thống kê.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SeriesStats {
    pub heart_rate: VitalStats,
    pub systolic: VitalStats,
    pub oxygen_saturation: VitalStats,
    pub total_records: usize,
}

/// Dữ liệu biểu đồ cho một chỉ số sống.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VitalTrend {
    pub vital: Vital,
    pub column: Option<String>,
    pub unit: String,
    pub points: Vec<VitalTrendPoint>,
}

impl VitalTrend {
    pub fn empty(vital: Vital) -> Self {
        Self {
            vital,
            column: None,
            unit: vital.unit().to_string(),
            points: Vec::new(),
        }
    }
}

/// Một điểm dữ liệu trong biểu đồ chỉ số sống.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VitalTrendPoint {
    pub timestamp: String,
    pub value: f64,
}

/// Lỗi chung của dashboard.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum VitalsError {
    #[error("Chưa chọn bệnh nhân để nhập dữ liệu")]
    NoPatientSelected,
    #[error("Không tìm thấy bệnh nhân {0}")]
    UnknownPatient(PatientId),
    #[error("Định dạng file không được hỗ trợ: {0}")]
    UnsupportedFile(String),
    #[error("Chưa có dữ liệu sức khỏe để phân tích")]
    NoData,
    #[error("Không đọc được dữ liệu: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_rounds_to_one_decimal() {
        assert_eq!(Average::of(&[70.0, 71.0, 71.0]), Average::Value(70.7));
        assert_eq!(Average::of(&[]), Average::NotAvailable);
        assert_eq!(Average::of(&[97.25]).to_string(), "97.3");
        assert_eq!(Average::NotAvailable.to_string(), "N/A");
    }

    #[test]
    fn record_serializes_fields_inline() {
        let record = HealthRecord::new(RecordId(7), "2024-01-01T00:00:00")
            .with("HR", FieldValue::Number(72.0))
            .with("note", FieldValue::Text("resting".to_string()));

        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "id": 7,
                "timestamp": "2024-01-01T00:00:00",
                "HR": 72.0,
                "note": "resting"
            })
        );

        let back: HealthRecord = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, record);
    }

    #[test]
    fn reserved_names_never_become_fields() {
        let mut record = HealthRecord::new(RecordId(1), "t1");
        assert!(!record.insert("id", FieldValue::Number(3.0)));
        assert!(!record.insert("timestamp", FieldValue::Text("t2".to_string())));
        assert!(record.fields.is_empty());
    }

    #[test]
    fn sequential_ids_continue_after_existing_series() {
        let series = vec![
            HealthRecord::new(RecordId(4), "t1"),
            HealthRecord::new(RecordId(9), "t2"),
        ];
        let mut ids = SequentialIds::after(&series);
        assert_eq!(ids.next_id(), RecordId(10));
        assert_eq!(ids.next_id(), RecordId(11));
        assert_eq!(SequentialIds::after(&[]).next_id(), RecordId(1));
    }

    #[test]
    fn sequential_ids_only_move_forward() {
        let mut ids = SequentialIds::new(20);
        ids.skip_past(&[HealthRecord::new(RecordId(4), "t1")]);
        ids.advance_to(7);
        assert_eq!(ids.next_id(), RecordId(20));

        ids.skip_past(&[HealthRecord::new(RecordId(30), "t2")]);
        assert_eq!(ids.next_id(), RecordId(31));
    }

    #[test]
    fn average_serializes_sentinel_as_text() {
        let stats = VitalStats::unavailable(Vital::HeartRate);
        let value = serde_json::to_value(&stats).expect("serialize");
        assert_eq!(value["average"], serde_json::json!("N/A"));
        assert_eq!(value["vital"], serde_json::json!("heart_rate"));

        let parsed: Average = serde_json::from_str("72.5").expect("number");
        assert_eq!(parsed, Average::Value(72.5));
    }

    #[test]
    fn vital_parses_from_key() {
        assert_eq!("oxygen_saturation".parse::<Vital>(), Ok(Vital::OxygenSaturation));
        assert!("pulse".parse::<Vital>().is_err());
    }
}
