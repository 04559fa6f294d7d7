//! Payload and response handling for the narrative summary provider.

use serde::{Deserialize, Serialize};
use vitals_core::{DashboardConfig, HealthRecord, VitalsError};

/// Shown in place of the narrative whenever the provider fails.
pub const SUMMARY_FALLBACK: &str = "Analysis failed. Please try again.";

const SUMMARY_INSTRUCTION: &str = "Analyze this health data and provide insights on trends, \
anomalies, and recommendations. Focus on HR (heart rate), BP (blood pressure), and SPO2 \
(oxygen saturation) if present. Data: ";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<SummaryMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryMessage {
    pub role: String,
    pub content: String,
}

/// Provider reply: a list of content fragments, concatenated for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummaryResponse {
    pub content: Vec<ContentFragment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentFragment {
    #[serde(default)]
    pub text: Option<String>,
}

impl SummaryResponse {
    pub fn narrative(&self) -> String {
        self.content
            .iter()
            .map(|fragment| fragment.text.as_deref().unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SummaryError {
    #[error("summary provider unreachable: {0}")]
    Transport(String),
    #[error("malformed summary response: {0}")]
    Malformed(String),
}

/// External text-generation service.
pub trait SummaryProvider {
    fn complete(&self, request: &SummaryRequest) -> Result<String, SummaryError>;
}

impl<F> SummaryProvider for F
where
    F: Fn(&SummaryRequest) -> Result<String, SummaryError>,
{
    fn complete(&self, request: &SummaryRequest) -> Result<String, SummaryError> {
        self(request)
    }
}

/// The leading `limit` records of the sorted series, the same window the table shows.
pub fn summary_records(series: &[HealthRecord], limit: usize) -> &[HealthRecord] {
    &series[..series.len().min(limit)]
}

pub fn build_summary_request(
    series: &[HealthRecord],
    config: &DashboardConfig,
) -> Result<SummaryRequest, VitalsError> {
    let sample = summary_records(series, config.summary_record_limit);
    let data = serde_json::to_string(sample).map_err(|err| VitalsError::Parse(err.to_string()))?;

    Ok(SummaryRequest {
        model: config.summary_model.clone(),
        max_tokens: config.summary_max_tokens,
        messages: vec![SummaryMessage {
            role: "user".to_string(),
            content: format!("{SUMMARY_INSTRUCTION}{data}"),
        }],
    })
}

/// Parse a provider reply body into display text.
pub fn read_summary_response(body: &str) -> Result<String, SummaryError> {
    serde_json::from_str::<SummaryResponse>(body)
        .map(|response| response.narrative())
        .map_err(|err| SummaryError::Malformed(err.to_string()))
}

pub fn narrative_or_fallback(result: Result<String, SummaryError>) -> String {
    match result {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, "summary provider failed");
            SUMMARY_FALLBACK.to_string()
        }
    }
}
