//! In-memory patient roster with selection, uploads and the last analysis.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vitals_core::{
    DashboardConfig, HealthRecord, NewPatient, Patient, PatientId, RecordIdGenerator,
    SequentialIds, SeriesStats, VitalTrend, VitalsError,
};

use crate::csv::parse_upload;
use crate::merge::merge_with_report;
use crate::stats::aggregate;
use crate::summary::{
    build_summary_request, narrative_or_fallback, SummaryError, SummaryProvider, SummaryRequest,
    SUMMARY_FALLBACK,
};
use crate::trend::present_trends;

/// Outcome of one committed upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    pub patient: PatientId,
    pub parsed: usize,
    pub updated: usize,
    pub appended: usize,
    pub total_records: usize,
}

/// Issued when an analysis starts; a result is only kept if the same patient
/// is still selected when it comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisTicket {
    patient: PatientId,
}

impl AnalysisTicket {
    pub fn patient(&self) -> PatientId {
        self.patient
    }
}

pub struct Dashboard {
    config: DashboardConfig,
    patients: BTreeMap<PatientId, Patient>,
    selected: Option<PatientId>,
    next_patient: u64,
    ids: Box<dyn RecordIdGenerator>,
    last_analysis: Option<String>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new(DashboardConfig::default())
    }
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> Self {
        Self::with_ids(config, Box::new(SequentialIds::default()))
    }

    /// Use a caller-supplied record id source for every upload in the session.
    pub fn with_ids(config: DashboardConfig, ids: Box<dyn RecordIdGenerator>) -> Self {
        Self {
            config,
            patients: BTreeMap::new(),
            selected: None,
            next_patient: 1,
            ids,
            last_analysis: None,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn add_patient(&mut self, form: NewPatient, created_at: DateTime<Utc>) -> PatientId {
        let id = PatientId(self.next_patient);
        self.next_patient += 1;
        tracing::info!(patient = %id, name = %form.name, "patient added");
        self.patients.insert(id, Patient::new(id, form, created_at));
        id
    }

    pub fn patients(&self) -> impl Iterator<Item = &Patient> {
        self.patients.values()
    }

    pub fn patient(&self, id: PatientId) -> Option<&Patient> {
        self.patients.get(&id)
    }

    /// Changing the selection clears the previous patient's analysis.
    pub fn select_patient(&mut self, id: PatientId) -> Result<&Patient, VitalsError> {
        if !self.patients.contains_key(&id) {
            return Err(VitalsError::UnknownPatient(id));
        }
        if self.selected != Some(id) {
            self.last_analysis = None;
        }
        self.selected = Some(id);
        self.patients.get(&id).ok_or(VitalsError::UnknownPatient(id))
    }

    pub fn selected_patient(&self) -> Option<&Patient> {
        self.selected.and_then(|id| self.patients.get(&id))
    }

    /// Parse an uploaded file and merge it into the selected patient's series.
    ///
    /// Nothing is parsed unless a patient is selected and the file is CSV.
    pub fn upload(
        &mut self,
        file_name: &str,
        contents: &str,
        uploaded_at: DateTime<Utc>,
    ) -> Result<UploadReport, VitalsError> {
        let patient_id = self.selected.ok_or(VitalsError::NoPatientSelected)?;
        if !is_csv_file(file_name) {
            return Err(VitalsError::UnsupportedFile(file_name.to_string()));
        }

        let batch = parse_upload(contents, uploaded_at, self.ids.as_mut());
        let parsed = batch.len();

        let patient = self
            .patients
            .get_mut(&patient_id)
            .ok_or(VitalsError::UnknownPatient(patient_id))?;
        let (merged, merge) = merge_with_report(&patient.series, batch);
        patient.series = merged;

        let report = UploadReport {
            patient: patient_id,
            parsed,
            updated: merge.updated,
            appended: merge.appended,
            total_records: patient.series.len(),
        };
        tracing::info!(
            patient = %patient_id,
            file = file_name,
            parsed = report.parsed,
            total = report.total_records,
            "upload committed"
        );
        Ok(report)
    }

    pub fn stats(&self) -> Option<SeriesStats> {
        self.selected_patient()
            .map(|patient| aggregate(&patient.series))
    }

    /// Leading records shown in the data table.
    pub fn table_rows(&self) -> &[HealthRecord] {
        self.selected_patient()
            .map(|patient| {
                let end = patient.series.len().min(self.config.table_window);
                &patient.series[..end]
            })
            .unwrap_or_default()
    }

    pub fn trends(&self) -> Vec<VitalTrend> {
        self.selected_patient()
            .map(|patient| present_trends(&patient.series, self.config.chart_window))
            .unwrap_or_default()
    }

    pub fn begin_analysis(&self) -> Result<(AnalysisTicket, SummaryRequest), VitalsError> {
        let patient = self
            .selected_patient()
            .ok_or(VitalsError::NoPatientSelected)?;
        if patient.series.is_empty() {
            return Err(VitalsError::NoData);
        }

        let request = build_summary_request(&patient.series, &self.config)?;
        Ok((AnalysisTicket { patient: patient.id }, request))
    }

    /// Store the provider outcome. Returns `false` when the result was
    /// discarded because the selection moved on.
    pub fn complete_analysis(
        &mut self,
        ticket: AnalysisTicket,
        result: Result<String, SummaryError>,
    ) -> bool {
        if self.selected != Some(ticket.patient) {
            tracing::warn!(patient = %ticket.patient, "discarding analysis for deselected patient");
            return false;
        }

        self.last_analysis = Some(narrative_or_fallback(result));
        true
    }

    pub fn run_analysis(&mut self, provider: &dyn SummaryProvider) -> Result<&str, VitalsError> {
        let (ticket, request) = self.begin_analysis()?;
        let result = provider.complete(&request);
        self.complete_analysis(ticket, result);
        Ok(self.last_analysis.as_deref().unwrap_or(SUMMARY_FALLBACK))
    }

    pub fn last_analysis(&self) -> Option<&str> {
        self.last_analysis.as_deref()
    }
}

/// Only `.csv` uploads are parsed (any ASCII case).
pub fn is_csv_file(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use vitals_core::{Average, FieldValue, RecordId};

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, hour, 0, 0).unwrap()
    }

    fn dashboard_with_patient() -> (Dashboard, PatientId) {
        let mut dashboard = Dashboard::default();
        let id = dashboard.add_patient(NewPatient::named("Ada"), at(0));
        dashboard.select_patient(id).expect("select");
        (dashboard, id)
    }

    #[test]
    fn upload_without_selection_is_rejected_before_parsing() {
        let mut dashboard = Dashboard::default();
        dashboard.add_patient(NewPatient::named("Ada"), at(0));

        let result = dashboard.upload("vitals.csv", "timestamp,HR\n2024-01-01,70\n", at(1));

        assert_eq!(result, Err(VitalsError::NoPatientSelected));
        assert!(dashboard.patients().all(|p| p.series.is_empty()));
    }

    #[test]
    fn non_csv_files_are_rejected() {
        let (mut dashboard, _) = dashboard_with_patient();
        let result = dashboard.upload("export.db", "SQLite format 3", at(1));
        assert_eq!(result, Err(VitalsError::UnsupportedFile("export.db".to_string())));
    }

    #[test]
    fn uploads_merge_into_selected_series() {
        let (mut dashboard, id) = dashboard_with_patient();

        let first = dashboard
            .upload("hr.CSV", "timestamp,HR\n2024-01-01T01:00:00,70\n2024-01-01T00:00:00,66\n", at(1))
            .expect("first upload");
        assert_eq!(first.appended, 2);

        let second = dashboard
            .upload("spo2.csv", "timestamp,SPO2\n2024-01-01T01:00:00,97\n", at(2))
            .expect("second upload");
        assert_eq!(second.updated, 1);
        assert_eq!(second.total_records, 2);

        let series = &dashboard.patient(id).expect("patient").series;
        assert_eq!(series[0].timestamp, "2024-01-01T00:00:00");
        assert_eq!(series[0].id, RecordId(2));
        assert_eq!(series[1].id, RecordId(1));
        assert_eq!(series[1].get("SPO2"), Some(&FieldValue::Number(97.0)));

        let stats = dashboard.stats().expect("stats");
        assert_eq!(stats.heart_rate.average, Average::Value(68.0));
        assert_eq!(stats.oxygen_saturation.count, 1);
    }

    #[test]
    fn record_ids_stay_unique_across_patients() {
        let (mut dashboard, _) = dashboard_with_patient();
        dashboard.upload("a.csv", "HR\n70\n", at(1)).expect("upload");

        let other = dashboard.add_patient(NewPatient::named("Grace"), at(2));
        dashboard.select_patient(other).expect("select");
        dashboard.upload("b.csv", "HR\n71\n", at(3)).expect("upload");

        let ids: Vec<RecordId> = dashboard
            .patients()
            .flat_map(|p| p.series.iter().map(|r| r.id))
            .collect();
        assert_eq!(ids, vec![RecordId(1), RecordId(2)]);
    }

    #[test]
    fn unknown_patient_cannot_be_selected() {
        let mut dashboard = Dashboard::default();
        assert!(matches!(
            dashboard.select_patient(PatientId(42)),
            Err(VitalsError::UnknownPatient(PatientId(42)))
        ));
    }

    #[test]
    fn analysis_requires_data() {
        let (dashboard, _) = dashboard_with_patient();
        assert!(matches!(dashboard.begin_analysis(), Err(VitalsError::NoData)));
    }

    #[test]
    fn provider_failure_sets_fallback_without_touching_series() {
        let (mut dashboard, id) = dashboard_with_patient();
        dashboard.upload("a.csv", "timestamp,HR\n2024-01-01,70\n", at(1)).expect("upload");
        let before = dashboard.patient(id).expect("patient").series.clone();

        let failing = |_: &SummaryRequest| -> Result<String, SummaryError> {
            Err(SummaryError::Transport("timeout".to_string()))
        };
        let text = dashboard.run_analysis(&failing).expect("analysis");

        assert_eq!(text, SUMMARY_FALLBACK);
        assert_eq!(dashboard.patient(id).expect("patient").series, before);

        dashboard.upload("b.csv", "timestamp,HR\n2024-01-02,72\n", at(2)).expect("upload after failure");
    }

    #[test]
    fn late_result_for_previous_patient_is_discarded() {
        let (mut dashboard, _) = dashboard_with_patient();
        dashboard.upload("a.csv", "HR\n70\n", at(1)).expect("upload");
        let (ticket, _request) = dashboard.begin_analysis().expect("begin");

        let other = dashboard.add_patient(NewPatient::named("Grace"), at(2));
        dashboard.select_patient(other).expect("select");

        assert!(!dashboard.complete_analysis(ticket, Ok("stale".to_string())));
        assert_eq!(dashboard.last_analysis(), None);
    }

    #[test]
    fn table_and_trends_follow_config_windows() {
        let config = DashboardConfig {
            table_window: 2,
            chart_window: 1,
            ..DashboardConfig::default()
        };
        let mut dashboard = Dashboard::new(config);
        let id = dashboard.add_patient(NewPatient::named("Ada"), at(0));
        dashboard.select_patient(id).expect("select");
        dashboard
            .upload("a.csv", "timestamp,HR\n2024-01-01,70\n2024-01-02,71\n2024-01-03,72\n", at(1))
            .expect("upload");

        assert_eq!(dashboard.table_rows().len(), 2);
        let trends = dashboard.trends();
        assert_eq!(trends.len(), 1);
        assert_eq!(trends[0].points.len(), 1);
    }
}
