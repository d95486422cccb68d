//! # Registration
//!
//! Software depth/color registration from the device's factory calibration.
//!
//! For every depth pixel the engine:
//! - looks up where the pixel lands in the distorted depth image
//!   (`undistorted` output)
//! - projects it into the color image through the depth-to-color polynomial
//!   and samples one BGRX pixel (`registered` output)
//!
//! Lookup tables depend only on calibration and depth dimensions and are
//! built on first use.
//!
//! ```ignore
//! use registration::SoftwareRegistration;
//!
//! let registration = SoftwareRegistration::new(device.ir_camera_params(), device.color_camera_params());
//! let view = registration.apply(&bundle.color, &bundle.depth)?;
//! ```

mod tables;

use std::sync::{Arc, Mutex};

use contracts::{
    pod_slice_to_bytes, ColorParams, ContractError, IrParams, RegisteredView, Registration,
    StreamFrame, StreamKind,
};
use tracing::debug;

use crate::tables::RegistrationTables;

/// Color resolution the calibration polynomial is expressed in
const CALIBRATION_COLOR_WIDTH: f32 = 1920.0;
const CALIBRATION_COLOR_HEIGHT: f32 = 1080.0;

/// Registration engine backed by precomputed lookup tables
pub struct SoftwareRegistration {
    ir: IrParams,
    color: ColorParams,
    tables: Mutex<Option<Arc<RegistrationTables>>>,
}

impl SoftwareRegistration {
    pub fn new(ir: IrParams, color: ColorParams) -> Self {
        Self {
            ir,
            color,
            tables: Mutex::new(None),
        }
    }

    pub fn ir_params(&self) -> &IrParams {
        &self.ir
    }

    pub fn color_params(&self) -> &ColorParams {
        &self.color
    }

    /// Tables for the given depth dimensions, rebuilt if the size differs
    fn tables_for(&self, width: u32, height: u32) -> Result<Arc<RegistrationTables>, ContractError> {
        let mut guard = self
            .tables
            .lock()
            .map_err(|_| ContractError::registration("lookup table lock poisoned"))?;

        if let Some(tables) = guard.as_ref() {
            if tables.width == width && tables.height == height {
                return Ok(Arc::clone(tables));
            }
        }

        debug!(width, height, "building registration tables");
        let tables = Arc::new(RegistrationTables::build(&self.ir, &self.color, width, height));
        *guard = Some(Arc::clone(&tables));
        Ok(tables)
    }
}

fn check_frame(frame: &StreamFrame, expected: StreamKind) -> Result<(), ContractError> {
    if frame.kind != expected {
        return Err(ContractError::registration(format!(
            "expected {expected} frame, got {}",
            frame.kind
        )));
    }
    if frame.bytes_per_pixel != 4 {
        return Err(ContractError::registration(format!(
            "{} frame must have 4 bytes per pixel, got {}",
            frame.kind, frame.bytes_per_pixel
        )));
    }
    if !frame.is_consistent() {
        return Err(ContractError::registration(format!(
            "{} payload is {} bytes, header implies {}",
            frame.kind,
            frame.data.len(),
            frame.expected_len()
        )));
    }
    Ok(())
}

impl Registration for SoftwareRegistration {
    fn apply(&self, color: &StreamFrame, depth: &StreamFrame) -> Result<RegisteredView, ContractError> {
        check_frame(color, StreamKind::Color)?;
        check_frame(depth, StreamKind::Depth)?;

        let tables = self.tables_for(depth.width, depth.height)?;
        let depth_samples = depth.f32_samples();

        let pixel_count = depth.width as usize * depth.height as usize;
        let color_width = color.width as usize;
        let color_height = color.height as usize;
        let scale_x = color.width as f32 / CALIBRATION_COLOR_WIDTH;
        let scale_y = color.height as f32 / CALIBRATION_COLOR_HEIGHT;
        let shift = self.color.shift_m;

        let mut undistorted = vec![0.0f32; pixel_count];
        let mut registered = vec![0u8; pixel_count * 4];

        for i in 0..pixel_count {
            let z = match tables.distort_index[i] {
                Some(index) => depth_samples[index],
                None => 0.0,
            };
            undistorted[i] = z;

            if z <= 0.0 || !z.is_finite() {
                continue;
            }

            let cx = (tables.color_x[i] + shift / z) * self.color.fx + self.color.cx;
            let cx = (cx * scale_x + 0.5).floor();
            let cy = (tables.color_y[i] as f32 * scale_y + 0.5).floor();
            if cx < 0.0 || cy < 0.0 || cx >= color_width as f32 || cy >= color_height as f32 {
                continue;
            }

            let offset = (cy as usize * color_width + cx as usize) * 4;
            registered[i * 4..i * 4 + 4].copy_from_slice(&color.data[offset..offset + 4]);
        }

        Ok(RegisteredView {
            registered: StreamFrame {
                kind: StreamKind::Color,
                width: depth.width,
                height: depth.height,
                bytes_per_pixel: 4,
                timestamp: color.timestamp,
                sequence: color.sequence,
                data: registered.into(),
            },
            undistorted: StreamFrame {
                kind: StreamKind::Depth,
                width: depth.width,
                height: depth.height,
                bytes_per_pixel: 4,
                timestamp: depth.timestamp,
                sequence: depth.sequence,
                data: pod_slice_to_bytes(&undistorted),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn depth_frame(width: u32, height: u32, value: f32) -> StreamFrame {
        let samples = vec![value; (width * height) as usize];
        StreamFrame {
            kind: StreamKind::Depth,
            width,
            height,
            bytes_per_pixel: 4,
            timestamp: 7,
            sequence: 1,
            data: pod_slice_to_bytes(&samples),
        }
    }

    fn color_frame(width: u32, height: u32, pixel: [u8; 4]) -> StreamFrame {
        let data: Vec<u8> = pixel
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        StreamFrame {
            kind: StreamKind::Color,
            width,
            height,
            bytes_per_pixel: 4,
            timestamp: 9,
            sequence: 1,
            data: Bytes::from(data),
        }
    }

    #[test]
    fn test_output_geometry_follows_depth() {
        let registration = SoftwareRegistration::new(IrParams::default(), ColorParams::default());
        let view = registration
            .apply(&color_frame(1920, 1080, [1, 2, 3, 4]), &depth_frame(512, 424, 1500.0))
            .unwrap();

        for frame in [&view.registered, &view.undistorted] {
            assert_eq!((frame.width, frame.height, frame.bytes_per_pixel), (512, 424, 4));
            assert!(frame.is_consistent());
        }
        assert_eq!(view.undistorted.timestamp, 7);
        assert_eq!(view.registered.timestamp, 9);
    }

    #[test]
    fn test_uniform_color_is_sampled_near_center() {
        let registration = SoftwareRegistration::new(IrParams::default(), ColorParams::default());
        let view = registration
            .apply(&color_frame(1920, 1080, [10, 20, 30, 0]), &depth_frame(512, 424, 1500.0))
            .unwrap();

        let center = (212 * 512 + 256) * 4;
        assert_eq!(&view.registered.data[center..center + 4], &[10, 20, 30, 0]);

        let samples = view.undistorted.f32_samples();
        assert_eq!(samples[212 * 512 + 256], 1500.0);
    }

    #[test]
    fn test_zero_depth_leaves_registered_empty() {
        let registration = SoftwareRegistration::new(IrParams::default(), ColorParams::default());
        let view = registration
            .apply(&color_frame(1920, 1080, [255; 4]), &depth_frame(512, 424, 0.0))
            .unwrap();

        assert!(view.registered.data.iter().all(|&b| b == 0));
        assert!(view.undistorted.f32_samples().iter().all(|&z| z == 0.0));
    }

    #[test]
    fn test_inconsistent_payload_rejected() {
        let registration = SoftwareRegistration::new(IrParams::default(), ColorParams::default());
        let mut depth = depth_frame(512, 424, 1000.0);
        depth.data = depth.data.slice(..100);

        let err = registration
            .apply(&color_frame(1920, 1080, [0; 4]), &depth)
            .unwrap_err();
        assert!(matches!(err, ContractError::Registration { .. }));
    }

    #[test]
    fn test_swapped_frames_rejected() {
        let registration = SoftwareRegistration::new(IrParams::default(), ColorParams::default());
        let color = color_frame(1920, 1080, [0; 4]);
        let depth = depth_frame(512, 424, 1000.0);
        assert!(registration.apply(&depth, &color).is_err());
    }

    #[test]
    fn test_tables_rebuilt_on_new_dimensions() {
        let registration = SoftwareRegistration::new(IrParams::default(), ColorParams::default());
        let small = registration.tables_for(64, 48).unwrap();
        let again = registration.tables_for(64, 48).unwrap();
        assert!(Arc::ptr_eq(&small, &again));

        let full = registration.tables_for(512, 424).unwrap();
        assert_eq!(full.distort_index.len(), 512 * 424);
    }
}
