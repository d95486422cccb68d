//! Layered error definitions
//!
//! Categorized by source: config / device / sync / buffer / remap

use thiserror::Error;

use crate::{BufferKind, StreamKind};

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Device Errors =====
    /// Enumeration found zero devices
    #[error("no device connected")]
    NoDeviceFound,

    /// Device open failure
    #[error("failed to open device '{serial}': {message}")]
    DeviceOpenFailed { serial: String, message: String },

    /// Requested backend is not offered by the driver
    #[error("pipeline '{requested}' unavailable (available: {available:?})")]
    BackendUnavailable {
        requested: String,
        available: Vec<String>,
    },

    /// Device start/stop/close failure
    #[error("device error: {message}")]
    Device { message: String },

    // ===== Sync Errors =====
    /// No complete bundle within the timeout
    #[error("sync timeout: waited {waited_ms}ms for streams: {missing:?}")]
    Timeout {
        waited_ms: u64,
        missing: Vec<StreamKind>,
    },

    /// Bundle handed back twice, or not the outstanding one
    #[error("bundle {bundle_id} is not outstanding (double release)")]
    DoubleRelease { bundle_id: u64 },

    /// Registration engine failure
    #[error("registration error: {message}")]
    Registration { message: String },

    // ===== Buffer Errors =====
    /// Source frame length disagrees with the allocated buffer
    #[error("buffer '{buffer}' size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch {
        buffer: BufferKind,
        expected: usize,
        actual: usize,
    },

    /// Allocation requested with a different geometry than the current one
    #[error("buffer set already allocated with a different geometry")]
    GeometryChanged,

    /// Buffer set used before allocation
    #[error("buffer set not allocated")]
    NotAllocated,

    // ===== Remap Errors =====
    /// Legacy remap arguments are inconsistent
    #[error("invalid geometry arguments: {message}")]
    InvalidGeometryArguments { message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn device_open(serial: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceOpenFailed {
            serial: serial.into(),
            message: message.into(),
        }
    }

    pub fn device(message: impl Into<String>) -> Self {
        Self::Device {
            message: message.into(),
        }
    }

    pub fn registration(message: impl Into<String>) -> Self {
        Self::Registration {
            message: message.into(),
        }
    }

    pub fn invalid_geometry(message: impl Into<String>) -> Self {
        Self::InvalidGeometryArguments {
            message: message.into(),
        }
    }

    /// Whether the capture loop may retry after this error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ContractError::BufferSizeMismatch {
            buffer: BufferKind::Registered,
            expected: 868_352,
            actual: 12,
        };
        assert_eq!(
            err.to_string(),
            "buffer 'registered' size mismatch: expected 868352, got 12"
        );

        let err = ContractError::Timeout {
            waited_ms: 10_000,
            missing: vec![StreamKind::Color],
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("10000ms"));
    }
}
