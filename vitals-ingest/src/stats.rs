//! Aggregate statistics over a patient's series.

use vitals_core::{Average, HealthRecord, SeriesStats, Vital, VitalStats};

use crate::resolve::resolve_column;

/// Averages and counts for heart rate, systolic pressure and oxygen saturation.
pub fn aggregate(series: &[HealthRecord]) -> SeriesStats {
    SeriesStats {
        heart_rate: vital_stats(series, Vital::HeartRate),
        systolic: vital_stats(series, Vital::Systolic),
        oxygen_saturation: vital_stats(series, Vital::OxygenSaturation),
        total_records: series.len(),
    }
}

/// Stats for one vital. Only numeric values in the resolved column count.
pub fn vital_stats(series: &[HealthRecord], vital: Vital) -> VitalStats {
    let Some(column) = resolve_column(series, vital.synonyms()) else {
        return VitalStats::unavailable(vital);
    };

    let values: Vec<f64> = series
        .iter()
        .filter_map(|record| record.numeric(column))
        .collect();

    VitalStats {
        vital,
        column: Some(column.to_string()),
        average: Average::of(&values),
        count: values.len(),
    }
}
