//! Config validation
//!
//! Rules:
//! - version is supported
//! - 0 < min_depth_m < max_depth_m
//! - timeout_ms > 0, probe_timeout_ms > 0
//! - mock fps and frame dimensions > 0
//! - mock serials unique and non-empty
//! - with legacy_remap, depth frames fit the legacy canvas

use std::collections::HashSet;

use contracts::{ContractError, LegacyGeometry, SessionConfig};

const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Validate a `SessionConfig`; returns the first problem found
pub fn validate(config: &SessionConfig) -> Result<(), ContractError> {
    validate_version(config)?;
    validate_depth_range(config)?;
    validate_capture(config)?;
    validate_mock(config)?;
    validate_legacy_remap(config)?;
    Ok(())
}

fn validate_version(config: &SessionConfig) -> Result<(), ContractError> {
    if !SUPPORTED_VERSIONS.contains(&config.version.as_str()) {
        return Err(ContractError::config_validation(
            "version",
            format!(
                "unsupported config version '{}' (supported: {})",
                config.version,
                SUPPORTED_VERSIONS.join(", ")
            ),
        ));
    }
    Ok(())
}

fn validate_depth_range(config: &SessionConfig) -> Result<(), ContractError> {
    let depth = &config.depth;

    // NaN fails both comparisons
    if !(depth.min_depth_m > 0.0) {
        return Err(ContractError::config_validation(
            "depth.min_depth_m",
            format!("min_depth_m must be > 0, got {}", depth.min_depth_m),
        ));
    }
    if !(depth.min_depth_m < depth.max_depth_m) {
        return Err(ContractError::config_validation(
            "depth.min_depth_m / depth.max_depth_m",
            format!(
                "min_depth_m ({}) must be < max_depth_m ({})",
                depth.min_depth_m, depth.max_depth_m
            ),
        ));
    }
    Ok(())
}

fn validate_capture(config: &SessionConfig) -> Result<(), ContractError> {
    let capture = &config.capture;
    if capture.timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "capture.timeout_ms",
            "timeout_ms must be > 0",
        ));
    }
    if capture.probe_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "capture.probe_timeout_ms",
            "probe_timeout_ms must be > 0",
        ));
    }
    Ok(())
}

fn validate_mock(config: &SessionConfig) -> Result<(), ContractError> {
    let mock = &config.mock;
    if mock.fps == 0 {
        return Err(ContractError::config_validation(
            "mock.fps",
            "fps must be > 0",
        ));
    }

    let dimensions = [
        ("mock.color_width", mock.color_width),
        ("mock.color_height", mock.color_height),
        ("mock.depth_width", mock.depth_width),
        ("mock.depth_height", mock.depth_height),
    ];
    if let Some((field, _)) = dimensions.iter().find(|(_, value)| *value == 0) {
        return Err(ContractError::config_validation(
            *field,
            "frame dimensions must be > 0",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, serial) in mock.serials.iter().enumerate() {
        if serial.is_empty() {
            return Err(ContractError::config_validation(
                format!("mock.serials[{idx}]"),
                "serial cannot be empty",
            ));
        }
        if !seen.insert(serial) {
            return Err(ContractError::config_validation(
                format!("mock.serials[{idx}]"),
                format!("duplicate serial '{serial}'"),
            ));
        }
    }
    Ok(())
}

fn validate_legacy_remap(config: &SessionConfig) -> Result<(), ContractError> {
    if !config.capture.legacy_remap {
        return Ok(());
    }
    let legacy = LegacyGeometry::KINECT_V1;
    let (width, height) = (config.mock.depth_width, config.mock.depth_height);
    if !legacy.fits(width, height) {
        return Err(ContractError::config_validation(
            "capture.legacy_remap",
            format!(
                "depth frames of {width}x{height} do not fit the legacy {}x{} canvas at offset ({}, {})",
                legacy.canvas_width, legacy.canvas_height, legacy.offset_x, legacy.offset_y
            ),
        ));
    }
    Ok(())
}
