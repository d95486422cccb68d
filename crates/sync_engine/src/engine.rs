//! Frame synchronizer: one bundle in, five buffers out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{
    BufferKind, ContractError, FrameBundle, Registration, RegisteredView, SensorGeometry,
    SharedListener, StreamKind, Timestamps,
};
use tracing::{debug, error, instrument, warn};

use crate::buffer::FrameBufferSet;

/// Synchronizer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Successful captures
    pub bundles_captured: u64,
    /// Waits that ran out of time
    pub timeouts: u64,
    /// Captures that failed after a bundle was acquired
    pub failed_cycles: u64,
    /// Per-stream timestamps that went backwards
    pub timestamp_regressions: u64,
}

/// Result of one successful capture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureReport {
    pub bundle_id: u64,
    pub timestamps: Timestamps,
    /// Wait + registration + copy
    pub latency: Duration,
}

/// Waits for bundles, registers them and copies them into a `FrameBufferSet`
pub struct FrameSynchronizer {
    listener: SharedListener,
    registration: Arc<dyn Registration>,
    stats: SyncStats,
    last_timestamps: Option<Timestamps>,
}

impl std::fmt::Debug for FrameSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSynchronizer")
            .field("stats", &self.stats)
            .field("last_timestamps", &self.last_timestamps)
            .finish()
    }
}

impl FrameSynchronizer {
    pub fn new(listener: SharedListener, registration: Arc<dyn Registration>) -> Self {
        Self {
            listener,
            registration,
            stats: SyncStats::default(),
            last_timestamps: None,
        }
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    pub fn listener(&self) -> &SharedListener {
        &self.listener
    }

    /// Capture one bundle to learn the stream geometry
    ///
    /// The probe bundle is released without touching any buffer.
    #[instrument(name = "frame_sync_probe", skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    pub fn probe(&mut self, timeout: Duration) -> Result<SensorGeometry, ContractError> {
        let bundle = self.wait(timeout)?;
        let result = self
            .registration
            .apply(&bundle.color, &bundle.depth)
            .map(|view| SensorGeometry::from_probe(&bundle, &view));
        let geometry = self.finish_cycle(bundle, result)?;

        debug!(
            color = %geometry.color,
            depth = %geometry.depth,
            registered = %geometry.registered,
            "probe geometry"
        );
        Ok(geometry)
    }

    /// Capture the most recent bundle into `buffers`
    ///
    /// # Errors
    /// - `ContractError::Timeout`: buffers unchanged, recoverable
    /// - `ContractError::BufferSizeMismatch` / `Registration`: buffers
    ///   unchanged, bundle released
    #[instrument(
        name = "frame_sync_capture",
        skip(self, buffers),
        fields(timeout_ms = timeout.as_millis() as u64)
    )]
    pub fn capture_frame(
        &mut self,
        buffers: &mut FrameBufferSet,
        timeout: Duration,
    ) -> Result<CaptureReport, ContractError> {
        let started = Instant::now();
        let bundle = self.wait(timeout)?;
        let bundle_id = bundle.id;

        let result = self.copy_bundle(&bundle, buffers);
        let timestamps = self.finish_cycle(bundle, result)?;

        self.check_regression(&timestamps);
        self.last_timestamps = Some(timestamps);
        self.stats.bundles_captured += 1;

        let latency = started.elapsed();
        metrics::counter!("frame_sync_bundles_captured").increment(1);
        metrics::histogram!("frame_sync_capture_latency_ms").record(latency.as_secs_f64() * 1000.0);

        Ok(CaptureReport {
            bundle_id,
            timestamps,
            latency,
        })
    }

    fn wait(&mut self, timeout: Duration) -> Result<FrameBundle, ContractError> {
        self.listener.wait_for_bundle(timeout).inspect_err(|err| {
            if err.is_timeout() {
                self.stats.timeouts += 1;
                metrics::counter!("frame_sync_timeouts").increment(1);
            }
        })
    }

    /// Release the bundle on every path; the cycle error wins over a release error
    fn finish_cycle<T>(
        &mut self,
        bundle: FrameBundle,
        result: Result<T, ContractError>,
    ) -> Result<T, ContractError> {
        let bundle_id = bundle.id;
        let released = self.listener.release(bundle);

        match (result, released) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => {
                self.stats.failed_cycles += 1;
                error!(bundle_id, error = %err, "bundle release failed");
                Err(err)
            }
            (Err(err), released) => {
                self.stats.failed_cycles += 1;
                if let Err(release_err) = released {
                    warn!(bundle_id, error = %release_err, "bundle release failed after capture error");
                }
                error!(bundle_id, error = %err, "capture cycle failed");
                Err(err)
            }
        }
    }

    /// Register, validate all five payloads, then copy
    fn copy_bundle(
        &self,
        bundle: &FrameBundle,
        buffers: &mut FrameBufferSet,
    ) -> Result<Timestamps, ContractError> {
        let RegisteredView {
            registered,
            undistorted,
        } = self.registration.apply(&bundle.color, &bundle.depth)?;

        let sources = [
            (BufferKind::Rgb, &bundle.color.data),
            (BufferKind::Ir, &bundle.infrared.data),
            (BufferKind::Depth, &bundle.depth.data),
            (BufferKind::Registered, &registered.data),
            (BufferKind::Undistorted, &undistorted.data),
        ];

        for (kind, data) in &sources {
            buffers.check(*kind, data.len())?;
        }
        for (kind, data) in &sources {
            buffers.write(*kind, data)?;
        }

        let mut timestamps = Timestamps::default();
        for kind in StreamKind::ALL {
            let timestamp = bundle.frame(kind).timestamp;
            buffers.record_timestamp(kind, timestamp);
            timestamps.set(kind, timestamp);
        }
        Ok(timestamps)
    }

    fn check_regression(&mut self, current: &Timestamps) {
        let Some(previous) = self.last_timestamps else {
            return;
        };
        for kind in StreamKind::ALL {
            if current.get(kind) < previous.get(kind) {
                self.stats.timestamp_regressions += 1;
                metrics::counter!("frame_sync_timestamp_regressions", "stream" => kind.as_str())
                    .increment(1);
                warn!(
                    stream = %kind,
                    previous = previous.get(kind),
                    current = current.get(kind),
                    "timestamp went backwards"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyncMultiFrameListener;
    use bytes::Bytes;
    use contracts::{pod_slice_to_bytes, FrameListener, StreamFrame, StreamGeometry};

    /// Registration stand-in: registered = zeros, undistorted = depth
    struct PassThrough;

    impl Registration for PassThrough {
        fn apply(
            &self,
            _color: &StreamFrame,
            depth: &StreamFrame,
        ) -> Result<RegisteredView, ContractError> {
            let mut registered = depth.clone();
            registered.kind = StreamKind::Color;
            registered.data = Bytes::from(vec![0u8; depth.data.len()]);
            Ok(RegisteredView {
                registered,
                undistorted: depth.clone(),
            })
        }
    }

    struct Failing;

    impl Registration for Failing {
        fn apply(&self, _: &StreamFrame, _: &StreamFrame) -> Result<RegisteredView, ContractError> {
            Err(ContractError::registration("calibration missing"))
        }
    }

    fn geometry() -> SensorGeometry {
        SensorGeometry {
            color: StreamGeometry::new(4, 2, 4),
            infrared: StreamGeometry::new(2, 2, 4),
            depth: StreamGeometry::new(2, 2, 4),
            registered: StreamGeometry::new(2, 2, 4),
            undistorted: StreamGeometry::new(2, 2, 4),
        }
    }

    fn frame(kind: StreamKind, width: u32, height: u32, timestamp: u32, fill: u8) -> StreamFrame {
        let data = match kind {
            StreamKind::Depth => pod_slice_to_bytes(&vec![fill as f32; (width * height) as usize]),
            _ => Bytes::from(vec![fill; (width * height * 4) as usize]),
        };
        StreamFrame {
            kind,
            width,
            height,
            bytes_per_pixel: 4,
            timestamp,
            sequence: timestamp,
            data,
        }
    }

    fn push(listener: &SyncMultiFrameListener, timestamp: u32, fill: u8) {
        listener.on_new_frame(frame(StreamKind::Color, 4, 2, timestamp, fill));
        listener.on_new_frame(frame(StreamKind::Infrared, 2, 2, timestamp, fill));
        listener.on_new_frame(frame(StreamKind::Depth, 2, 2, timestamp, fill));
    }

    fn setup(registration: Arc<dyn Registration>) -> (Arc<SyncMultiFrameListener>, FrameSynchronizer) {
        let listener = Arc::new(SyncMultiFrameListener::new());
        let shared: SharedListener = listener.clone();
        (listener, FrameSynchronizer::new(shared, registration))
    }

    #[test]
    fn test_probe_learns_geometry() {
        let (listener, mut sync) = setup(Arc::new(PassThrough));
        push(&listener, 1, 0);

        let probed = sync.probe(Duration::from_millis(10)).unwrap();
        assert_eq!(probed, geometry());
        assert_eq!(listener.outstanding(), None);
    }

    #[test]
    fn test_capture_copies_all_buffers() {
        let (listener, mut sync) = setup(Arc::new(PassThrough));
        let mut buffers = FrameBufferSet::with_geometry(geometry()).unwrap();
        push(&listener, 100, 7);

        let report = sync.capture_frame(&mut buffers, Duration::from_millis(10)).unwrap();
        assert_eq!(report.bundle_id, 1);
        assert_eq!(buffers.rgb(), &[7u8; 32]);
        assert_eq!(buffers.ir(), &[7u8; 16]);
        assert_eq!(buffers.depth(), &[7.0f32; 4]);
        assert_eq!(buffers.registered(), &[0u8; 16]);
        assert_eq!(buffers.undistorted_samples(), vec![7.0f32; 4]);
        assert_eq!(buffers.timestamp(StreamKind::Color), 100);
        assert_eq!(listener.outstanding(), None);
        assert_eq!(sync.stats().bundles_captured, 1);
    }

    #[test]
    fn test_timestamps_non_decreasing() {
        let (listener, mut sync) = setup(Arc::new(PassThrough));
        let mut buffers = FrameBufferSet::with_geometry(geometry()).unwrap();

        let mut previous = buffers.timestamps();
        for ts in [10, 20, 20, 35] {
            push(&listener, ts, 1);
            let report = sync.capture_frame(&mut buffers, Duration::from_millis(10)).unwrap();
            assert!(report.timestamps.not_before(&previous));
            previous = report.timestamps;
        }
        assert_eq!(sync.stats().timestamp_regressions, 0);
    }

    #[test]
    fn test_regression_counted() {
        let (listener, mut sync) = setup(Arc::new(PassThrough));
        let mut buffers = FrameBufferSet::with_geometry(geometry()).unwrap();
        push(&listener, 50, 1);
        sync.capture_frame(&mut buffers, Duration::from_millis(10)).unwrap();
        push(&listener, 40, 1);
        sync.capture_frame(&mut buffers, Duration::from_millis(10)).unwrap();
        assert_eq!(sync.stats().timestamp_regressions, 3);
    }

    #[test]
    fn test_timeout_leaves_buffers() {
        let (_listener, mut sync) = setup(Arc::new(PassThrough));
        let mut buffers = FrameBufferSet::with_geometry(geometry()).unwrap();
        buffers.write(BufferKind::Rgb, &[3; 32]).unwrap();
        let snapshot = buffers.clone();

        let err = sync.capture_frame(&mut buffers, Duration::from_millis(1)).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(buffers, snapshot);
        assert_eq!(sync.stats().timeouts, 1);
    }

    #[test]
    fn test_size_mismatch_releases_and_leaves_buffers() {
        let (listener, mut sync) = setup(Arc::new(PassThrough));
        let mut buffers = FrameBufferSet::with_geometry(geometry()).unwrap();
        let snapshot = buffers.clone();

        listener.on_new_frame(frame(StreamKind::Color, 4, 2, 1, 9));
        listener.on_new_frame(frame(StreamKind::Infrared, 2, 2, 1, 9));
        listener.on_new_frame(frame(StreamKind::Depth, 3, 2, 1, 9));

        let err = sync.capture_frame(&mut buffers, Duration::from_millis(10)).unwrap_err();
        assert!(matches!(
            err,
            ContractError::BufferSizeMismatch {
                buffer: BufferKind::Depth,
                ..
            }
        ));
        assert_eq!(buffers, snapshot);
        assert_eq!(listener.outstanding(), None);
        assert_eq!(sync.stats().failed_cycles, 1);
    }

    #[test]
    fn test_registration_failure_releases() {
        let (listener, mut sync) = setup(Arc::new(Failing));
        let mut buffers = FrameBufferSet::with_geometry(geometry()).unwrap();
        push(&listener, 1, 1);

        let err = sync.capture_frame(&mut buffers, Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, ContractError::Registration { .. }));
        assert_eq!(listener.outstanding(), None);

        push(&listener, 2, 1);
        assert!(sync.probe(Duration::from_millis(10)).is_err());
        assert_eq!(listener.outstanding(), None);
    }
}
