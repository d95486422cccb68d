//! Driver-side service traits
//!
//! The device driver, frame listener, registration engine and processing
//! backend are external services. These traits are the only way the rest of
//! the workspace talks to them, so a real driver binding and the mock driver
//! are interchangeable.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ColorParams, ContractError, FrameBundle, IrParams, RegisteredView, StreamFrame};

/// Shared handle to a frame listener (device producer + synchronizer consumer)
pub type SharedListener = Arc<dyn FrameListener>;

/// Frame listener service
///
/// The device pushes single frames in; the synchronizer takes them out as
/// complete bundles.
pub trait FrameListener: Send + Sync {
    /// Producer side: accept one frame from the device
    ///
    /// Returns `false` if the frame was ignored (listener not accepting).
    fn on_new_frame(&self, frame: StreamFrame) -> bool;

    /// Block until a complete Color + Infrared + Depth bundle is available
    ///
    /// # Errors
    /// `ContractError::Timeout` if no bundle arrives within `timeout`.
    fn wait_for_bundle(&self, timeout: Duration) -> Result<FrameBundle, ContractError>;

    /// Hand a bundle back to the driver
    ///
    /// # Errors
    /// `ContractError::DoubleRelease` if the bundle is not the one currently
    /// outstanding.
    fn release(&self, bundle: FrameBundle) -> Result<(), ContractError>;

    /// Drop frames received but not yet handed out; returns how many
    fn discard_pending(&self) -> usize;
}

/// Registration service (depth/color alignment)
pub trait Registration: Send + Sync {
    /// Produce the registered color and undistorted depth views
    fn apply(&self, color: &StreamFrame, depth: &StreamFrame)
        -> Result<RegisteredView, ContractError>;
}

/// Packet-processing backend variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BackendKind {
    #[default]
    #[serde(rename = "cpu")]
    Cpu,
    #[serde(rename = "opengl")]
    OpenGl,
    #[serde(rename = "opencl")]
    OpenCl,
    #[serde(rename = "opencl_kde")]
    OpenClKde,
    #[serde(rename = "cuda")]
    Cuda,
    #[serde(rename = "cuda_kde")]
    CudaKde,
}

impl BackendKind {
    pub const ALL: [BackendKind; 6] = [
        BackendKind::Cpu,
        BackendKind::OpenGl,
        BackendKind::OpenCl,
        BackendKind::OpenClKde,
        BackendKind::Cuda,
        BackendKind::CudaKde,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Cpu => "cpu",
            BackendKind::OpenGl => "opengl",
            BackendKind::OpenCl => "opencl",
            BackendKind::OpenClKde => "opencl_kde",
            BackendKind::Cuda => "cuda",
            BackendKind::CudaKde => "cuda_kde",
        }
    }

    /// Whether the backend takes a GPU device index
    pub fn uses_gpu_id(self) -> bool {
        matches!(
            self,
            BackendKind::OpenCl | BackendKind::OpenClKde | BackendKind::Cuda | BackendKind::CudaKde
        )
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "unknown backend '{s}', expected one of: {}",
                    BackendKind::ALL.map(BackendKind::as_str).join(", ")
                )
            })
    }
}

/// Depth processing parameters handed to the backend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthProcessorConfig {
    /// Minimum valid depth (meters)
    #[serde(default = "default_min_depth")]
    pub min_depth_m: f32,

    /// Maximum valid depth (meters)
    #[serde(default = "default_max_depth")]
    pub max_depth_m: f32,

    #[serde(default = "default_true")]
    pub bilateral_filter: bool,

    #[serde(default = "default_true")]
    pub edge_aware_filter: bool,
}

fn default_min_depth() -> f32 {
    0.3
}

fn default_max_depth() -> f32 {
    10.0
}

fn default_true() -> bool {
    true
}

impl Default for DepthProcessorConfig {
    fn default() -> Self {
        Self {
            min_depth_m: default_min_depth(),
            max_depth_m: default_max_depth(),
            bilateral_filter: true,
            edge_aware_filter: true,
        }
    }
}

impl DepthProcessorConfig {
    /// Valid depth range in millimeters (the unit of depth samples)
    pub fn range_mm(&self) -> (f32, f32) {
        (self.min_depth_m * 1000.0, self.max_depth_m * 1000.0)
    }
}

/// Packet-processing backend
pub trait ProcessingBackend: Send {
    fn kind(&self) -> BackendKind;

    /// GPU device index, for GPU backends
    fn gpu_id(&self) -> Option<u32>;

    fn configure(&mut self, config: &DepthProcessorConfig);

    /// Post-process one depth image in place (millimeters)
    fn process_depth(&self, samples: &mut [f32]);
}

/// An opened device
pub trait Device: Send {
    fn serial_number(&self) -> &str;

    fn firmware_version(&self) -> &str;

    fn ir_camera_params(&self) -> IrParams;

    fn color_camera_params(&self) -> ColorParams;

    fn set_color_frame_listener(&mut self, listener: SharedListener);

    fn set_ir_and_depth_frame_listener(&mut self, listener: SharedListener);

    /// Start all streams
    fn start(&mut self) -> Result<(), ContractError>;

    /// Stop all streams; idempotent
    fn stop(&mut self) -> Result<(), ContractError>;

    /// Close the device, dropping its listener references; idempotent
    fn close(&mut self) -> Result<(), ContractError>;
}

/// Device enumeration/open service
pub trait DeviceDriver {
    /// Enumerate attached devices, returning the count
    fn enumerate_devices(&mut self) -> usize;

    /// Serial of the first enumerated device
    fn default_serial(&self) -> Option<String>;

    /// Serials of every enumerated device
    fn serials(&self) -> Vec<String>;

    /// Backends this driver can construct
    fn available_backends(&self) -> Vec<BackendKind>;

    /// Construct a backend; `None` if the driver does not offer it
    fn create_backend(&self, kind: BackendKind, gpu_id: u32) -> Option<Box<dyn ProcessingBackend>>;

    /// Open a device by serial
    ///
    /// # Errors
    /// - `ContractError::NoDeviceFound` if nothing is enumerated
    /// - `ContractError::DeviceOpenFailed` if the device cannot be opened
    fn open_device(
        &mut self,
        serial: &str,
        backend: Box<dyn ProcessingBackend>,
    ) -> Result<Box<dyn Device>, ContractError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("cpu".parse::<BackendKind>(), Ok(BackendKind::Cpu));
        assert_eq!("OpenCL".parse::<BackendKind>(), Ok(BackendKind::OpenCl));
        assert_eq!("cuda-kde".parse::<BackendKind>(), Ok(BackendKind::CudaKde));
        assert!("vulkan".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_backend_serde_names() {
        for kind in BackendKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_depth_range_mm() {
        let config = DepthProcessorConfig::default();
        assert_eq!(config.range_mm(), (300.0, 10_000.0));
    }
}
