use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use vitals_core::{NewPatient, SeriesStats, VitalStats};
use vitals_ingest::Dashboard;

mod config;
#[cfg(feature = "http")]
mod provider;

use config::{init_logging, CliConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "vitals-cli",
    about = "Nhập file CSV chỉ số sống cho một bệnh nhân, xem thống kê và tóm tắt."
)]
struct Args {
    /// Đường dẫn file cấu hình TOML.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Mức log (mặc định warn, có thể dùng RUST_LOG).
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// In thống kê chỉ số sống sau khi nhập các file.
    Stats {
        #[command(flatten)]
        patient: PatientArgs,

        /// Xuất JSON thay vì văn bản.
        #[arg(long)]
        json: bool,
    },
    /// Tạo yêu cầu tóm tắt; với feature `http` sẽ gửi tới dịch vụ.
    Summarize {
        #[command(flatten)]
        patient: PatientArgs,

        /// Chỉ in payload, không gửi.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(clap::Args, Debug)]
struct PatientArgs {
    /// Tên bệnh nhân.
    #[arg(short, long)]
    name: String,

    #[arg(long)]
    age: Option<u32>,

    #[arg(long)]
    gender: Option<String>,

    #[arg(long)]
    medical_id: Option<String>,

    /// Các file CSV, nhập theo thứ tự.
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level)?;
    let config = CliConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Stats { patient, json } => {
            let dashboard = load_dashboard(&config, &patient)?;
            let stats = dashboard.stats().context("Chưa chọn bệnh nhân")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&patient.name, &stats);
            }
        }
        Command::Summarize { patient, dry_run } => {
            let mut dashboard = load_dashboard(&config, &patient)?;
            summarize(&mut dashboard, &config, dry_run)?;
        }
    }

    Ok(())
}

fn load_dashboard(config: &CliConfig, args: &PatientArgs) -> Result<Dashboard> {
    let mut dashboard = Dashboard::new(config.dashboard.clone());
    let id = dashboard.add_patient(
        NewPatient {
            name: args.name.clone(),
            age: args.age,
            gender: args.gender.clone(),
            medical_id: args.medical_id.clone(),
            ..NewPatient::default()
        },
        Utc::now(),
    );
    dashboard.select_patient(id)?;

    for path in &args.files {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Không đọc được file {:?}", path))?;
        let report = dashboard
            .upload(&display_name(path), &contents, Utc::now())
            .with_context(|| format!("Không nhập được file {:?}", path))?;
        tracing::info!(
            file = %path.display(),
            parsed = report.parsed,
            updated = report.updated,
            appended = report.appended,
            "file ingested"
        );
    }

    Ok(dashboard)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_stats(name: &str, stats: &SeriesStats) {
    println!("Patient: {name}\nTotal records: {}", stats.total_records);
    for vital in [&stats.heart_rate, &stats.systolic, &stats.oxygen_saturation] {
        println!("{}", format_vital_line(vital));
    }
}

fn format_vital_line(stats: &VitalStats) -> String {
    let column = stats.column.as_deref().unwrap_or("--");
    match stats.average.value() {
        Some(_) => format!(
            "{} [{column}]: {} {} ({} records)",
            stats.vital.label(),
            stats.average,
            stats.vital.unit(),
            stats.count
        ),
        None => format!("{} [{column}]: {}", stats.vital.label(), stats.average),
    }
}

fn summarize(dashboard: &mut Dashboard, config: &CliConfig, dry_run: bool) -> Result<()> {
    let (ticket, request) = dashboard.begin_analysis()?;

    if dry_run || !cfg!(feature = "http") {
        println!("{}", serde_json::to_string_pretty(&request)?);
        return Ok(());
    }

    #[cfg(feature = "http")]
    {
        use vitals_ingest::SummaryProvider;

        let provider = provider::HttpSummaryProvider::new(&config.provider)?;
        let result = provider.complete(&request);
        dashboard.complete_analysis(ticket, result);
        println!("{}", dashboard.last_analysis().unwrap_or_default());
    }

    #[cfg(not(feature = "http"))]
    let _ = (ticket, config);

    Ok(())
}
