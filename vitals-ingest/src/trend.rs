//! Chart feeds derived from a series.

use vitals_core::{HealthRecord, Vital, VitalTrend, VitalTrendPoint};

use crate::resolve::resolve_column;

/// Points for `vital` over the first `window` records of the series.
///
/// Records whose value in the resolved column is not numeric are skipped.
pub fn vital_trend(series: &[HealthRecord], vital: Vital, window: usize) -> VitalTrend {
    let Some(column) = resolve_column(series, vital.synonyms()) else {
        return VitalTrend::empty(vital);
    };

    let points = series
        .iter()
        .take(window)
        .filter_map(|record| {
            record.numeric(column).map(|value| VitalTrendPoint {
                timestamp: record.timestamp.clone(),
                value,
            })
        })
        .collect();

    VitalTrend {
        vital,
        column: Some(column.to_string()),
        unit: vital.unit().to_string(),
        points,
    }
}

/// Trends for every vital present in the series.
pub fn present_trends(series: &[HealthRecord], window: usize) -> Vec<VitalTrend> {
    Vital::ALL
        .into_iter()
        .map(|vital| vital_trend(series, vital, window))
        .filter(|trend| trend.column.is_some())
        .collect()
}
