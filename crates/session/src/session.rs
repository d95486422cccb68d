//! Session lifecycle
//!
//! `Uninitialized -> Configured -> Streaming -> Stopped`

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    BackendKind, ColorParams, ContractError, Device, DeviceDriver, FrameListener, IrParams,
    Registration, SensorGeometry, SessionConfig, SharedListener, StreamKind, Timestamps,
};
use registration::SoftwareRegistration;
use remap::mirror_horizontally;
use sync_engine::{
    CaptureReport, FrameBufferSet, FrameSynchronizer, ListenerStats, SyncMultiFrameListener,
    SyncStats,
};
use tracing::{debug, error, info, instrument, warn};

use crate::backend::BackendFactory;
use crate::error::{Result, SessionError};
use crate::shutdown::ShutdownToken;

/// Builds the registration engine from the device calibration
pub type RegistrationFactory = fn(IrParams, ColorParams) -> Arc<dyn Registration>;

fn software_registration(ir: IrParams, color: ColorParams) -> Arc<dyn Registration> {
    Arc::new(SoftwareRegistration::new(ir, color))
}

/// Lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Configured,
    Streaming,
    Stopped,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Configured => "configured",
            SessionState::Streaming => "streaming",
            SessionState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capture loop summary
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopStats {
    pub frames: u64,
    pub timeouts: u64,
    pub elapsed: Duration,
}

impl LoopStats {
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// Result of `Session::selftest`
#[derive(Debug, Clone)]
pub struct SelftestReport {
    pub serial: String,
    pub firmware: String,
    pub backend: BackendKind,
    pub geometry: SensorGeometry,
    /// Timestamps of every captured frame, in capture order
    pub timestamps: Vec<Timestamps>,
}

/// One acquisition session over a device driver
pub struct Session<D: DeviceDriver> {
    driver: D,
    config: SessionConfig,
    state: SessionState,
    device: Option<Box<dyn Device>>,
    listener: Option<Arc<SyncMultiFrameListener>>,
    registration: Option<Arc<dyn Registration>>,
    synchronizer: Option<FrameSynchronizer>,
    buffers: FrameBufferSet,
    geometry: Option<SensorGeometry>,
    backend_kind: Option<BackendKind>,
    serial: Option<String>,
    firmware: Option<String>,
    final_stats: SyncStats,
    registration_factory: RegistrationFactory,
}

impl<D: DeviceDriver> fmt::Debug for Session<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("serial", &self.serial)
            .field("backend", &self.backend_kind)
            .field("geometry", &self.geometry)
            .finish()
    }
}

impl<D: DeviceDriver> Session<D> {
    pub fn new(driver: D, config: SessionConfig) -> Self {
        Self {
            driver,
            config,
            state: SessionState::Uninitialized,
            device: None,
            listener: None,
            registration: None,
            synchronizer: None,
            buffers: FrameBufferSet::new(),
            geometry: None,
            backend_kind: None,
            serial: None,
            firmware: None,
            final_stats: SyncStats::default(),
            registration_factory: software_registration,
        }
    }

    /// Replace the registration engine constructor
    pub fn with_registration_factory(mut self, factory: RegistrationFactory) -> Self {
        self.registration_factory = factory;
        self
    }

    fn require(&self, operation: &'static str, expected: SessionState) -> Result<()> {
        match self.state {
            state if state == expected => Ok(()),
            SessionState::Stopped => Err(SessionError::UseAfterStop { operation }),
            state => Err(SessionError::InvalidState { operation, state }),
        }
    }

    /// Open the device and build the listener and registration engine
    ///
    /// # Errors
    /// `NoDeviceFound`, `BackendUnavailable`, `DeviceOpenFailed`
    #[instrument(
        name = "session_configure",
        skip(self),
        fields(backend = %self.config.pipeline.backend, serial = ?self.config.device.serial)
    )]
    pub fn configure(&mut self) -> Result<()> {
        self.require("configure", SessionState::Uninitialized)?;

        let count = self.driver.enumerate_devices();
        if count == 0 {
            error!("no device connected");
            return Err(ContractError::NoDeviceFound.into());
        }
        debug!(count, "devices enumerated");

        let pipeline = &self.config.pipeline;
        let backend =
            BackendFactory::select(&self.driver, pipeline.backend, pipeline.gpu_id, &self.config.depth)?;
        let backend_kind = backend.kind();

        let serial = match &self.config.device.serial {
            Some(serial) => serial.clone(),
            None => self.driver.default_serial().ok_or(ContractError::NoDeviceFound)?,
        };

        let device = self.driver.open_device(&serial, backend)?;
        let registration = (self.registration_factory)(
            device.ir_camera_params(),
            device.color_camera_params(),
        );

        info!(
            serial = %device.serial_number(),
            firmware = %device.firmware_version(),
            "device configured"
        );

        self.serial = Some(device.serial_number().to_string());
        self.firmware = Some(device.firmware_version().to_string());
        self.backend_kind = Some(backend_kind);
        self.listener = Some(Arc::new(SyncMultiFrameListener::new()));
        self.registration = Some(registration);
        self.device = Some(device);
        self.state = SessionState::Configured;
        Ok(())
    }

    /// Start streaming, probe the geometry and allocate the buffers
    ///
    /// On a failed probe the streams are stopped again and the session stays
    /// `Configured`.
    #[instrument(name = "session_start", skip(self))]
    pub fn start(&mut self) -> Result<()> {
        self.require("start", SessionState::Configured)?;

        let (Some(device), Some(listener), Some(registration)) =
            (self.device.as_mut(), self.listener.as_ref(), self.registration.as_ref())
        else {
            return Err(SessionError::InvalidState {
                operation: "start",
                state: self.state,
            });
        };

        let shared: SharedListener = listener.clone();
        device.set_color_frame_listener(Arc::clone(&shared));
        device.set_ir_and_depth_frame_listener(Arc::clone(&shared));
        device.start()?;

        let mut synchronizer = FrameSynchronizer::new(shared, Arc::clone(registration));
        let probe_timeout = Duration::from_millis(self.config.capture.probe_timeout_ms);

        let geometry = match synchronizer
            .probe(probe_timeout)
            .and_then(|geometry| self.buffers.allocate(geometry).map(|()| geometry))
        {
            Ok(geometry) => geometry,
            Err(err) => {
                error!(error = %err, "startup probe failed");
                metrics::counter!("session_probe_failures").increment(1);
                if let Err(stop_err) = device.stop() {
                    warn!(error = %stop_err, "failed to stop streams after probe failure");
                }
                listener.discard_pending();
                return Err(err.into());
            }
        };

        info!(
            color = %geometry.color,
            infrared = %geometry.infrared,
            depth = %geometry.depth,
            registered = %geometry.registered,
            undistorted = %geometry.undistorted,
            "session streaming"
        );

        self.synchronizer = Some(synchronizer);
        self.geometry = Some(geometry);
        self.state = SessionState::Streaming;
        metrics::counter!("session_streams_started").increment(1);
        Ok(())
    }

    /// Capture one synchronized frame into the session buffers
    ///
    /// Mirrors the depth buffer when `capture.mirror_depth` is set.
    pub fn capture_frame(&mut self) -> Result<CaptureReport> {
        self.require("capture_frame", SessionState::Streaming)?;

        let synchronizer = self
            .synchronizer
            .as_mut()
            .ok_or(SessionError::InvalidState {
                operation: "capture_frame",
                state: self.state,
            })?;
        let timeout = Duration::from_millis(self.config.capture.timeout_ms);
        let report = synchronizer.capture_frame(&mut self.buffers, timeout)?;

        if self.config.capture.mirror_depth {
            if let Some(geometry) = &self.geometry {
                mirror_horizontally(
                    self.buffers.depth_mut(),
                    geometry.depth.width as usize,
                    geometry.depth.height as usize,
                )?;
            }
        }
        Ok(report)
    }

    /// Capture until `token` fires or `max_frames` frames were captured
    ///
    /// Timeouts are logged and retried; any other error ends the loop.
    pub fn run<F>(&mut self, token: &ShutdownToken, max_frames: Option<u64>, on_frame: F) -> Result<LoopStats>
    where
        F: FnMut(&CaptureReport, &FrameBufferSet),
    {
        self.run_with(token, max_frames, on_frame, |_| {})
    }

    /// `run` with a hook receiving the missing streams of every timeout
    #[instrument(
        name = "session_run",
        skip(self, token, on_frame, on_timeout),
        fields(max_frames = ?max_frames)
    )]
    pub fn run_with<F, T>(
        &mut self,
        token: &ShutdownToken,
        max_frames: Option<u64>,
        mut on_frame: F,
        mut on_timeout: T,
    ) -> Result<LoopStats>
    where
        F: FnMut(&CaptureReport, &FrameBufferSet),
        T: FnMut(&[StreamKind]),
    {
        let started = Instant::now();
        let mut stats = LoopStats::default();

        loop {
            if token.is_shutdown() {
                info!(frames = stats.frames, "shutdown requested, leaving capture loop");
                break;
            }
            if max_frames.is_some_and(|max| stats.frames >= max) {
                break;
            }

            match self.capture_frame() {
                Ok(report) => {
                    stats.frames += 1;
                    on_frame(&report, &self.buffers);
                }
                Err(err) if err.is_timeout() => {
                    stats.timeouts += 1;
                    warn!(error = %err, "no frame within timeout, retrying");
                    on_timeout(err.missing_streams());
                }
                Err(err) => {
                    error!(error = %err, frames = stats.frames, "capture loop aborted");
                    return Err(err);
                }
            }
        }

        stats.elapsed = started.elapsed();
        info!(
            frames = stats.frames,
            timeouts = stats.timeouts,
            fps = stats.fps(),
            "capture loop finished"
        );
        Ok(stats)
    }

    /// Release held frames, stop streams, close the device, then drop the
    /// listener and registration engine
    ///
    /// Idempotent. Every step runs even if an earlier one fails; the first
    /// failure is returned.
    #[instrument(name = "session_stop", skip(self), fields(state = %self.state))]
    pub fn stop(&mut self) -> Result<()> {
        if self.state == SessionState::Stopped {
            return Ok(());
        }

        let mut first_error: Option<ContractError> = None;

        if let Some(listener) = &self.listener {
            let discarded = listener.discard_pending();
            listener.stop();
            debug!(discarded, "listener drained");
        }

        if let Some(device) = self.device.as_mut() {
            teardown_step("stop streams", device.stop(), &mut first_error);
            teardown_step("close device", device.close(), &mut first_error);
        }
        self.device = None;

        if let Some(synchronizer) = self.synchronizer.take() {
            self.final_stats = synchronizer.stats();
        }
        self.listener = None;
        self.registration = None;
        self.state = SessionState::Stopped;

        info!(ok = first_error.is_none(), "session stopped");
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// configure + start + capture `frames` frames + stop
    ///
    /// The session is stopped on every path.
    pub fn selftest(&mut self, frames: usize) -> Result<SelftestReport> {
        let result = self.selftest_inner(frames);
        let stopped = self.stop();
        let report = result?;
        stopped?;
        Ok(report)
    }

    fn selftest_inner(&mut self, frames: usize) -> Result<SelftestReport> {
        if self.state == SessionState::Uninitialized {
            self.configure()?;
        }
        if self.state == SessionState::Configured {
            self.start()?;
        }

        let mut timestamps = Vec::with_capacity(frames);
        for _ in 0..frames {
            timestamps.push(self.capture_frame()?.timestamps);
        }

        let geometry = self.geometry.ok_or(SessionError::InvalidState {
            operation: "selftest",
            state: self.state,
        })?;
        Ok(SelftestReport {
            serial: self.serial.clone().unwrap_or_default(),
            firmware: self.firmware.clone().unwrap_or_default(),
            backend: self.backend_kind.unwrap_or_default(),
            geometry,
            timestamps,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn geometry(&self) -> Option<&SensorGeometry> {
        self.geometry.as_ref()
    }

    pub fn buffers(&self) -> &FrameBufferSet {
        &self.buffers
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial.as_deref()
    }

    pub fn firmware_version(&self) -> Option<&str> {
        self.firmware.as_deref()
    }

    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend_kind
    }

    /// Synchronizer counters (final values once stopped)
    pub fn sync_stats(&self) -> SyncStats {
        self.synchronizer
            .as_ref()
            .map(FrameSynchronizer::stats)
            .unwrap_or(self.final_stats)
    }

    pub fn listener_stats(&self) -> Option<ListenerStats> {
        self.listener.as_ref().map(|listener| listener.stats())
    }
}

impl<D: DeviceDriver> Drop for Session<D> {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(error = %err, "session teardown reported an error");
        }
    }
}

/// Run one teardown step, log a failure and keep the first one
fn teardown_step(step: &str, result: std::result::Result<(), ContractError>, first: &mut Option<ContractError>) {
    if let Err(err) = result {
        error!(step, error = %err, "teardown step failed");
        metrics::counter!("session_teardown_failures", "step" => step.to_string()).increment(1);
        if first.is_none() {
            *first = Some(err);
        }
    }
}
