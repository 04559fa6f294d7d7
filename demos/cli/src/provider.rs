//! Gọi dịch vụ tóm tắt qua HTTP (feature `http`).

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use vitals_ingest::{read_summary_response, SummaryError, SummaryProvider, SummaryRequest};

use crate::config::ProviderConfig;

pub struct HttpSummaryProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSummaryProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Không tạo được HTTP client")?;
        let api_key = std::env::var(&config.api_key_env).ok();
        if api_key.is_none() {
            tracing::warn!(var = %config.api_key_env, "summary API key not set");
        }

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }
}

impl SummaryProvider for HttpSummaryProvider {
    fn complete(&self, request: &SummaryRequest) -> Result<String, SummaryError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key);
        }

        let body = builder
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(|err| SummaryError::Transport(err.to_string()))?;

        read_summary_response(&body)
    }
}
