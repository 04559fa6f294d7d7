//! Cấu hình CLI: file TOML tùy chọn và khởi tạo log.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vitals_core::DashboardConfig;

/// Mức log
#[derive(clap::ValueEnum, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Cấu hình tổng của CLI.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    pub dashboard: DashboardConfig,
    pub provider: ProviderConfig,
}

/// Dịch vụ tóm tắt bên ngoài.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// URL nhận payload tóm tắt.
    pub endpoint: String,
    /// Biến môi trường chứa API key.
    pub api_key_env: String,
    /// Thời gian chờ (giây).
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            api_key_env: "VITALS_SUMMARY_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

impl CliConfig {
    /// Đọc file TOML nếu được chỉ định, ngược lại dùng mặc định.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path)
            .with_context(|| format!("Không đọc được file cấu hình {}", path.display()))?;
        Self::from_toml(&text)
            .with_context(|| format!("File cấu hình không hợp lệ {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Khởi tạo tracing; `RUST_LOG` vẫn được áp dụng trên mức mặc định.
pub fn init_logging(level: Option<LogLevel>) -> Result<()> {
    let default_level = level.map_or(Level::WARN, Level::from);
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
        .map_err(|err| anyhow!("Không khởi tạo được log: {err}"))
}
