//! Pipeline orchestrator - drives one capture session from open to teardown.

use std::cell::RefCell;

use anyhow::{Context, Result};
use contracts::{ContractError, SessionConfig, StreamKind};
use device::MockDriver;
use observability::{
    record_capture_timeout, record_dropped_bundles, record_frame_metrics, record_loop_fps,
    record_state_transition,
};
use remap::LegacyFrame;
use session::{Session, ShutdownToken};
use sync_engine::{CaptureReport, FrameBufferSet};
use tracing::{error, info};

use super::RunStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Session configuration after CLI overrides
    pub session: SessionConfig,

    /// Maximum number of frames to capture (None = unlimited)
    pub max_frames: Option<u64>,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Progress log interval in frames (0 = never)
    pub report_every: u64,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `token` fires or the frame limit is reached
    pub fn run(self, token: &ShutdownToken) -> Result<RunStats> {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let driver = MockDriver::with_config(self.config.session.mock.clone());
        let mut session = Session::new(driver, self.config.session.clone());

        session.configure().context("Failed to configure session")?;
        record_state_transition(session.state().as_str());
        info!(
            serial = session.serial_number().unwrap_or_default(),
            firmware = session.firmware_version().unwrap_or_default(),
            backend = ?session.backend_kind(),
            "Device opened"
        );

        session.start().context("Failed to start streaming")?;
        record_state_transition(session.state().as_str());

        let result = self.capture(&mut session, token);

        let listener = session.listener_stats().unwrap_or_default();
        let stopped = session.stop().context("Failed to stop session");
        record_state_transition(session.state().as_str());

        let mut stats = result?;
        stopped?;
        stats.sync = session.sync_stats();
        stats.listener = listener;
        stats.capture_metrics.set_dropped_bundles(listener.bundles_dropped);
        record_dropped_bundles(listener.bundles_dropped);
        record_loop_fps(stats.fps());

        Ok(stats)
    }

    fn capture(&self, session: &mut Session<MockDriver>, token: &ShutdownToken) -> Result<RunStats> {
        let report_every = self.config.report_every;
        let mut legacy = self
            .config
            .session
            .capture
            .legacy_remap
            .then(LegacyFrame::default);
        let mut remapped = 0u64;
        let mut remap_error: Option<ContractError> = None;
        let aggregator = RefCell::new(observability::CaptureStatsAggregator::new());

        let on_frame = |report: &CaptureReport, buffers: &FrameBufferSet| {
            record_frame_metrics(report.bundle_id, &report.timestamps, report.latency);
            let frames = {
                let mut aggregator = aggregator.borrow_mut();
                aggregator.record_frame(&report.timestamps, report.latency);
                aggregator.total_frames
            };

            if let (Some(canvas), Some(geometry)) = (legacy.as_mut(), buffers.geometry()) {
                if remap_error.is_none() {
                    match canvas.remap_from(
                        buffers.depth(),
                        buffers.registered(),
                        geometry.registered.width as usize,
                        geometry.registered.height as usize,
                    ) {
                        Ok(()) => remapped += 1,
                        Err(e) => {
                            error!(error = %e, "Legacy remap failed, stopping capture");
                            remap_error = Some(e);
                            token.trigger();
                        }
                    }
                }
            }

            if report_every > 0 && frames % report_every == 0 {
                info!(
                    frames,
                    bundle_id = report.bundle_id,
                    color_ts = report.timestamps.color,
                    depth_ts = report.timestamps.depth,
                    latency_us = report.latency.as_micros() as u64,
                    "Capture progress"
                );
            }
        };

        let on_timeout = |missing: &[StreamKind]| {
            record_capture_timeout(missing);
            aggregator.borrow_mut().record_timeout(missing);
        };

        let loop_stats = session
            .run_with(token, self.config.max_frames, on_frame, on_timeout)
            .context("Capture loop failed")?;

        if let Some(e) = remap_error {
            return Err(anyhow::Error::new(e).context("Legacy remap failed"));
        }

        let mut stats = RunStats {
            frames_remapped: remapped,
            capture_metrics: aggregator.into_inner(),
            ..RunStats::default()
        };
        stats.apply_loop(&loop_stats);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_session() -> SessionConfig {
        let mut session = SessionConfig::default();
        session.mock.fps = 200;
        session.mock.color_width = 64;
        session.mock.color_height = 36;
        session.mock.depth_width = 32;
        session.mock.depth_height = 24;
        session.capture.timeout_ms = 1000;
        session.capture.probe_timeout_ms = 1000;
        session
    }

    #[test]
    fn test_pipeline_runs_to_max_frames() {
        let mut session = small_session();
        session.capture.legacy_remap = true;
        let pipeline = Pipeline::new(PipelineConfig {
            session,
            max_frames: Some(5),
            metrics_port: None,
            report_every: 2,
        });

        let stats = pipeline.run(&ShutdownToken::new()).unwrap();
        assert_eq!(stats.frames_captured, 5);
        assert_eq!(stats.frames_remapped, 5);
        assert_eq!(stats.sync.bundles_captured, 5);
        assert_eq!(stats.capture_metrics.total_frames, 5);
        assert!(stats.listener.bundles_published >= 6);
    }

    #[test]
    fn test_pipeline_reports_open_failure() {
        let mut session = small_session();
        session.mock.device_count = 0;
        let pipeline = Pipeline::new(PipelineConfig {
            session,
            max_frames: Some(1),
            metrics_port: None,
            report_every: 0,
        });

        let err = pipeline.run(&ShutdownToken::new()).unwrap_err();
        assert!(format!("{err:#}").contains("no device connected"));
    }

    #[test]
    fn test_pipeline_fails_on_legacy_geometry_mismatch() {
        let mut session = small_session();
        session.mock.depth_width = 600;
        session.capture.legacy_remap = true;
        let token = ShutdownToken::new();
        let pipeline = Pipeline::new(PipelineConfig {
            session,
            max_frames: Some(3),
            metrics_port: None,
            report_every: 0,
        });

        let err = pipeline.run(&token).unwrap_err();
        assert!(format!("{err:#}").contains("Legacy remap failed"));
        assert!(err
            .chain()
            .any(|cause| matches!(
                cause.downcast_ref::<ContractError>(),
                Some(ContractError::InvalidGeometryArguments { .. })
            )));
        assert!(token.is_shutdown());
    }

    #[test]
    fn test_pipeline_stops_on_shutdown() {
        let token = ShutdownToken::new();
        token.trigger();
        let pipeline = Pipeline::new(PipelineConfig {
            session: small_session(),
            max_frames: None,
            metrics_port: None,
            report_every: 0,
        });

        let stats = pipeline.run(&token).unwrap();
        assert_eq!(stats.frames_captured, 0);
    }
}
