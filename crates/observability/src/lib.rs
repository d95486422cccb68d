//! # Observability
//!
//! Tracing subscriber setup and capture metrics.
//!
//! ## Features
//!
//! - Tracing initialization (JSON/Pretty/Compact), honoring `RUST_LOG`
//! - Optional `LOGFILE` sink: plain-text output to a file, console fallback
//! - Optional Prometheus exporter
//! - Capture statistics aggregation for end-of-run summaries
//!
//! ## Example
//!
//! ```ignore
//! observability::init()?;
//!
//! let report = session.capture_frame()?;
//! observability::record_frame_metrics(report.bundle_id, &report.timestamps, report.latency);
//! ```

pub mod metrics;

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use crate::metrics::{
    record_capture_timeout, record_dropped_bundles, record_frame_metrics, record_loop_fps,
    record_state_transition, CaptureStatsAggregator, CaptureSummary, RunningStats, StatsSummary,
};

/// Environment variable naming the log file
pub const LOGFILE_ENV: &str = "LOGFILE";

/// Initialize tracing with defaults (JSON to console or `LOGFILE`, no exporter)
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// Observability configuration
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
    /// Level used when `RUST_LOG` is unset
    pub default_log_level: String,
    /// Log file; unopenable paths fall back to the console
    pub log_file: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: None,
            default_log_level: "info".to_string(),
            log_file: std::env::var_os(LOGFILE_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
        }
    }
}

/// Log format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON structured logs
    #[default]
    Json,
    /// Human readable, multi-line
    Pretty,
    /// Single line
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Open `path` for appending, or `None` if that is not possible
pub fn open_log_file(path: &Path) -> Option<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .ok()
}

/// Resolve the writer: the log file when it opens, stdout otherwise.
/// The flag is true when the file is used.
fn make_writer(log_file: Option<&Path>) -> (BoxMakeWriter, bool) {
    match log_file.and_then(open_log_file) {
        Some(file) => (BoxMakeWriter::new(Mutex::new(file)), true),
        None => (BoxMakeWriter::new(std::io::stdout), false),
    }
}

/// Initialize with a custom configuration
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    // 1. Tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));
    let (writer, to_file) = make_writer(config.log_file.as_deref());

    match config.log_format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(!to_file)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_writer(writer)
                .with_ansi(!to_file);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_writer(writer)
                .with_ansi(!to_file);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
    }

    if let Some(path) = config.log_file.as_deref().filter(|_| !to_file) {
        tracing::warn!(path = %path.display(), "log file unavailable, logging to console");
    }

    // 2. Prometheus exporter (if enabled)
    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        log_file = ?config.log_file.as_ref().filter(|_| to_file),
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// Initialize only the Prometheus exporter (tracing is set up elsewhere)
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
