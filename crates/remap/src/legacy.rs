//! Legacy canvas remap

use contracts::{ContractError, LegacyGeometry};
use tracing::trace;

/// Bytes per color pixel (BGRX)
const COLOR_BPP: usize = 4;

/// Remap into the Kinect v1 canvas (`LegacyGeometry::KINECT_V1`)
///
/// Source pixel `(x, y)` of a `width x height` frame lands at
/// `(x + 64, y + 28)` in the 640x480 destinations. One depth sample and four
/// color bytes are copied per pixel; destination pixels outside the mapped
/// region are left untouched.
///
/// # Errors
/// `ContractError::InvalidGeometryArguments` if any length disagrees with the
/// dimensions or the source does not fit the canvas. Nothing is written then.
pub fn remap_to_legacy_geometry(
    src_depth: &[f32],
    src_color: &[u8],
    width: usize,
    height: usize,
    dst_depth: &mut [f32],
    dst_color: &mut [u8],
) -> Result<(), ContractError> {
    remap_with(
        &LegacyGeometry::KINECT_V1,
        src_depth,
        src_color,
        width,
        height,
        dst_depth,
        dst_color,
    )
}

/// Remap into an explicitly described legacy canvas
pub fn remap_with(
    legacy: &LegacyGeometry,
    src_depth: &[f32],
    src_color: &[u8],
    width: usize,
    height: usize,
    dst_depth: &mut [f32],
    dst_color: &mut [u8],
) -> Result<(), ContractError> {
    validate(legacy, src_depth.len(), src_color.len(), width, height, dst_depth.len(), dst_color.len())?;

    for y in 0..height {
        let src_row = y * width;
        let dst_row = legacy.canvas_index(0, y);

        dst_depth[dst_row..dst_row + width].copy_from_slice(&src_depth[src_row..src_row + width]);
        dst_color[dst_row * COLOR_BPP..(dst_row + width) * COLOR_BPP]
            .copy_from_slice(&src_color[src_row * COLOR_BPP..(src_row + width) * COLOR_BPP]);
    }

    trace!(width, height, "remapped into legacy canvas");
    Ok(())
}

fn validate(
    legacy: &LegacyGeometry,
    src_depth_len: usize,
    src_color_len: usize,
    width: usize,
    height: usize,
    dst_depth_len: usize,
    dst_color_len: usize,
) -> Result<(), ContractError> {
    let pixels = width
        .checked_mul(height)
        .ok_or_else(|| ContractError::invalid_geometry(format!("{width}x{height} overflows")))?;

    if src_depth_len != pixels {
        return Err(ContractError::invalid_geometry(format!(
            "source depth has {src_depth_len} samples, {width}x{height} needs {pixels}"
        )));
    }
    if src_color_len != pixels * COLOR_BPP {
        return Err(ContractError::invalid_geometry(format!(
            "source color has {src_color_len} bytes, {width}x{height}x{COLOR_BPP} needs {}",
            pixels * COLOR_BPP
        )));
    }

    let canvas = legacy.pixel_count();
    if dst_depth_len != canvas {
        return Err(ContractError::invalid_geometry(format!(
            "legacy depth has {dst_depth_len} samples, canvas needs {canvas}"
        )));
    }
    if dst_color_len != canvas * COLOR_BPP {
        return Err(ContractError::invalid_geometry(format!(
            "legacy color has {dst_color_len} bytes, canvas needs {}",
            canvas * COLOR_BPP
        )));
    }

    let fits = u32::try_from(width)
        .ok()
        .zip(u32::try_from(height).ok())
        .is_some_and(|(w, h)| legacy.fits(w, h));
    if !fits {
        return Err(ContractError::invalid_geometry(format!(
            "{width}x{height} at offset ({}, {}) exceeds {}x{} canvas",
            legacy.offset_x, legacy.offset_y, legacy.canvas_width, legacy.canvas_height
        )));
    }
    Ok(())
}

/// Pre-sized legacy destination pair
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyFrame {
    geometry: LegacyGeometry,
    depth: Vec<f32>,
    color: Vec<u8>,
}

impl LegacyFrame {
    pub fn new(geometry: LegacyGeometry) -> Self {
        let pixels = geometry.pixel_count();
        Self {
            geometry,
            depth: vec![0.0; pixels],
            color: vec![0; pixels * COLOR_BPP],
        }
    }

    pub fn geometry(&self) -> &LegacyGeometry {
        &self.geometry
    }

    pub fn depth(&self) -> &[f32] {
        &self.depth
    }

    pub fn color(&self) -> &[u8] {
        &self.color
    }

    /// Remap a registered source frame into this canvas
    pub fn remap_from(
        &mut self,
        src_depth: &[f32],
        src_color: &[u8],
        width: usize,
        height: usize,
    ) -> Result<(), ContractError> {
        remap_with(
            &self.geometry,
            src_depth,
            src_color,
            width,
            height,
            &mut self.depth,
            &mut self.color,
        )
    }

    /// Zero both canvases
    pub fn clear(&mut self) {
        self.depth.fill(0.0);
        self.color.fill(0);
    }
}

impl Default for LegacyFrame {
    fn default() -> Self {
        Self::new(LegacyGeometry::KINECT_V1)
    }
}
