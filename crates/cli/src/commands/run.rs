//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use session::{install_signal_handler, ShutdownToken};
use tracing::info;

use super::resolve_config;
use crate::cli::RunArgs;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub fn run_capture(args: &RunArgs) -> Result<()> {
    let mut session = resolve_config(&args.device)?;
    if args.mirror {
        session.capture.mirror_depth = true;
    }
    if args.legacy_remap {
        session.capture.legacy_remap = true;
        ConfigLoader::validate(&session).context("Invalid configuration for --legacy-remap")?;
    }

    info!(
        backend = %session.pipeline.backend,
        serial = ?session.device.serial,
        timeout_ms = session.capture.timeout_ms,
        mirror_depth = session.capture.mirror_depth,
        legacy_remap = session.capture.legacy_remap,
        "Configuration loaded"
    );

    let pipeline = Pipeline::new(PipelineConfig {
        session,
        max_frames: (args.max_frames > 0).then_some(args.max_frames),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        report_every: args.report_every,
    });

    let token = ShutdownToken::new();
    install_signal_handler(&token).context("Failed to install Ctrl+C handler")?;

    info!("Starting capture...");
    let stats = pipeline.run(&token).context("Capture failed")?;

    info!(
        frames_captured = stats.frames_captured,
        timeouts = stats.timeouts,
        duration_secs = stats.duration.as_secs_f64(),
        fps = format!("{:.2}", stats.fps()),
        "Capture completed"
    );
    stats.print_summary();

    info!("kinect-sync finished");
    Ok(())
}
