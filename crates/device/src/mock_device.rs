//! Mock device
//!
//! Streams a static test pattern from a background thread into the frame
//! listeners, with the same call surface a real device exposes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use contracts::{
    pod_slice_to_bytes, ColorParams, ContractError, Device, IrParams, MockDriverConfig,
    ProcessingBackend, SharedListener, StreamFrame, StreamKind,
};
use tracing::{debug, info, trace};

use crate::events::{DeviceEvent, EventLog};
use crate::pattern::{color_pattern, depth_pattern, ir_pattern};

/// Device ticks per second (0.1 ms resolution)
const TICKS_PER_SECOND: u32 = 10_000;

/// Frames pushed by the producer thread; payloads are shared between cycles
#[derive(Clone)]
struct FrameTemplates {
    color: StreamFrame,
    infrared: StreamFrame,
    depth: StreamFrame,
}

impl FrameTemplates {
    fn build(config: &MockDriverConfig, backend: &dyn ProcessingBackend) -> Self {
        let (cw, ch) = (config.color_width, config.color_height);
        let (dw, dh) = (config.depth_width, config.depth_height);

        let mut depth = depth_pattern(dw, dh);
        backend.process_depth(&mut depth);

        let frame = |kind, width, height, data: Bytes| StreamFrame {
            kind,
            width,
            height,
            bytes_per_pixel: 4,
            timestamp: 0,
            sequence: 0,
            data,
        };

        Self {
            color: frame(StreamKind::Color, cw, ch, Bytes::from(color_pattern(cw, ch))),
            infrared: frame(StreamKind::Infrared, dw, dh, pod_slice_to_bytes(&ir_pattern(dw, dh))),
            depth: frame(StreamKind::Depth, dw, dh, pod_slice_to_bytes(&depth)),
        }
    }

    fn stamped(&self, sequence: u32, timestamp: u32) -> [StreamFrame; 3] {
        [&self.color, &self.infrared, &self.depth].map(|template| StreamFrame {
            sequence,
            timestamp,
            ..template.clone()
        })
    }
}

/// Simulated Kinect v2 device
pub struct MockDevice {
    serial: String,
    config: MockDriverConfig,
    backend: Box<dyn ProcessingBackend>,
    color_listener: Option<SharedListener>,
    ir_depth_listener: Option<SharedListener>,
    streaming: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    closed: bool,
    events: EventLog,
}

impl MockDevice {
    pub(crate) fn new(
        serial: String,
        config: MockDriverConfig,
        backend: Box<dyn ProcessingBackend>,
        events: EventLog,
    ) -> Self {
        events.record(DeviceEvent::Opened {
            serial: serial.clone(),
        });
        Self {
            serial,
            config,
            backend,
            color_listener: None,
            ir_depth_listener: None,
            streaming: Arc::new(AtomicBool::new(false)),
            worker: None,
            closed: false,
            events,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn backend(&self) -> &dyn ProcessingBackend {
        self.backend.as_ref()
    }

    fn frame_interval(&self) -> (Duration, u32) {
        let fps = self.config.fps.max(1);
        (Duration::from_secs_f64(1.0 / fps as f64), TICKS_PER_SECOND / fps)
    }
}

impl Device for MockDevice {
    fn serial_number(&self) -> &str {
        &self.serial
    }

    fn firmware_version(&self) -> &str {
        &self.config.firmware
    }

    fn ir_camera_params(&self) -> IrParams {
        IrParams::default()
    }

    fn color_camera_params(&self) -> ColorParams {
        ColorParams::default()
    }

    fn set_color_frame_listener(&mut self, listener: SharedListener) {
        self.color_listener = Some(listener);
        self.events.record(DeviceEvent::ListenerAttached {
            serial: self.serial.clone(),
        });
    }

    fn set_ir_and_depth_frame_listener(&mut self, listener: SharedListener) {
        self.ir_depth_listener = Some(listener);
        self.events.record(DeviceEvent::ListenerAttached {
            serial: self.serial.clone(),
        });
    }

    fn start(&mut self) -> Result<(), ContractError> {
        if self.closed {
            return Err(ContractError::device(format!("device {} is closed", self.serial)));
        }
        // Idempotent: already streaming
        if self.streaming.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let templates = FrameTemplates::build(&self.config, self.backend.as_ref());
        let (interval, ticks_per_frame) = self.frame_interval();
        let color_listener = self.color_listener.clone();
        let ir_depth_listener = self.ir_depth_listener.clone();
        let streaming = Arc::clone(&self.streaming);
        let silent = self.config.silent;
        let serial = self.serial.clone();

        let worker = thread::Builder::new()
            .name(format!("mock-device-{serial}"))
            .spawn(move || {
                let mut sequence: u32 = 0;
                debug!(serial = %serial, silent, "mock device streaming");

                while streaming.load(Ordering::Relaxed) {
                    sequence = sequence.wrapping_add(1);
                    let timestamp = sequence.wrapping_mul(ticks_per_frame);

                    if !silent {
                        let [color, infrared, depth] = templates.stamped(sequence, timestamp);
                        if let Some(listener) = &color_listener {
                            listener.on_new_frame(color);
                        }
                        if let Some(listener) = &ir_depth_listener {
                            listener.on_new_frame(infrared);
                            listener.on_new_frame(depth);
                        }
                        metrics::counter!("mock_device_bundles_produced").increment(1);
                        trace!(sequence, timestamp, "mock frames pushed");
                    }

                    thread::sleep(interval);
                }

                debug!(serial = %serial, frames = sequence, "mock device stopped streaming");
            })
            .map_err(|e| {
                self.streaming.store(false, Ordering::SeqCst);
                ContractError::device(format!("failed to spawn producer thread: {e}"))
            })?;

        self.worker = Some(worker);
        self.events.record(DeviceEvent::Started {
            serial: self.serial.clone(),
        });
        info!(serial = %self.serial, backend = %self.backend.kind(), "device started");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ContractError> {
        self.streaming.store(false, Ordering::SeqCst);
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        worker
            .join()
            .map_err(|_| ContractError::device("producer thread panicked"))?;
        self.events.record(DeviceEvent::Stopped {
            serial: self.serial.clone(),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), ContractError> {
        if self.closed {
            return Ok(());
        }
        let stopped = self.stop();

        self.color_listener = None;
        self.ir_depth_listener = None;
        self.closed = true;
        self.events.record(DeviceEvent::Closed {
            serial: self.serial.clone(),
        });
        stopped
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
