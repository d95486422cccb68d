//! SessionConfig - configuration-layer output
//!
//! Everything needed to configure and run one acquisition session. Sections
//! default independently so a config file only names what it overrides.

use serde::{Deserialize, Serialize};

use crate::{BackendKind, DepthProcessorConfig};

/// Session configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Config schema version
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub depth: DepthProcessorConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    /// Mock driver setup (ignored by real drivers)
    #[serde(default)]
    pub mock: MockDriverConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Device selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Serial number; first enumerated device when absent
    #[serde(default)]
    pub serial: Option<String>,
}

/// Packet-processing pipeline selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// GPU device index for GPU backends
    #[serde(default)]
    pub gpu_id: u32,
}

/// Capture loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Steady-state wait per bundle
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Wait for the startup probe bundle
    #[serde(default = "default_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Mirror the depth buffer horizontally after each capture
    #[serde(default)]
    pub mirror_depth: bool,

    /// Remap registered output into the legacy 640x480 canvas
    #[serde(default)]
    pub legacy_remap: bool,
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            probe_timeout_ms: default_timeout_ms(),
            mirror_depth: false,
            legacy_remap: false,
        }
    }
}

/// Mock driver setup and failure injection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockDriverConfig {
    /// Devices reported by enumeration
    #[serde(default = "default_device_count")]
    pub device_count: usize,

    /// Explicit serials; generated when shorter than `device_count`
    #[serde(default)]
    pub serials: Vec<String>,

    /// Frame rate of the producer thread
    #[serde(default = "default_fps")]
    pub fps: u32,

    #[serde(default = "default_color_width")]
    pub color_width: u32,

    #[serde(default = "default_color_height")]
    pub color_height: u32,

    #[serde(default = "default_depth_width")]
    pub depth_width: u32,

    #[serde(default = "default_depth_height")]
    pub depth_height: u32,

    /// Serials whose open call fails
    #[serde(default)]
    pub fail_open: Vec<String>,

    /// Start streaming but never deliver a frame
    #[serde(default)]
    pub silent: bool,

    /// Backends the driver offers
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendKind>,

    #[serde(default = "default_firmware")]
    pub firmware: String,
}

fn default_device_count() -> usize {
    1
}

fn default_fps() -> u32 {
    30
}

fn default_color_width() -> u32 {
    1920
}

fn default_color_height() -> u32 {
    1080
}

fn default_depth_width() -> u32 {
    512
}

fn default_depth_height() -> u32 {
    424
}

fn default_backends() -> Vec<BackendKind> {
    vec![BackendKind::Cpu, BackendKind::OpenGl]
}

fn default_firmware() -> String {
    "2.3.3913.0.7".to_string()
}

impl Default for MockDriverConfig {
    fn default() -> Self {
        Self {
            device_count: default_device_count(),
            serials: Vec::new(),
            fps: default_fps(),
            color_width: default_color_width(),
            color_height: default_color_height(),
            depth_width: default_depth_width(),
            depth_height: default_depth_height(),
            fail_open: Vec::new(),
            silent: false,
            backends: default_backends(),
            firmware: default_firmware(),
        }
    }
}

impl MockDriverConfig {
    /// Serial of the `index`-th mock device
    pub fn serial_at(&self, index: usize) -> String {
        self.serials
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("{:012}", 500_000_000_000u64 + index as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: SessionConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.capture.timeout_ms, 10_000);
        assert_eq!(config.pipeline.backend, BackendKind::Cpu);
        assert_eq!(config.mock.device_count, 1);
        assert_eq!(config.depth, DepthProcessorConfig::default());
    }

    #[test]
    fn test_mock_serial_generation() {
        let mock = MockDriverConfig {
            serials: vec!["A".to_string()],
            ..Default::default()
        };
        assert_eq!(mock.serial_at(0), "A");
        assert_eq!(mock.serial_at(1), "500000000001");
    }
}
