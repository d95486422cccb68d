//! Per-pixel lookup tables

use contracts::{ColorParams, IrParams};

/// Depth pixel coordinate scale used by the depth-to-color polynomial
const DEPTH_Q: f32 = 0.01;
/// Color pixel coordinate scale used by the depth-to-color polynomial
const COLOR_Q: f32 = 0.002199;

/// Lookup tables for one depth resolution
#[derive(Debug)]
pub(crate) struct RegistrationTables {
    pub width: u32,
    pub height: u32,
    /// Source index in the distorted depth image, per undistorted pixel
    pub distort_index: Vec<Option<usize>>,
    /// Depth-independent part of the color x coordinate
    pub color_x: Vec<f32>,
    /// Color row (calibration resolution)
    pub color_y: Vec<i32>,
}

impl RegistrationTables {
    pub fn build(ir: &IrParams, color: &ColorParams, width: u32, height: u32) -> Self {
        let pixel_count = width as usize * height as usize;
        let mut distort_index = Vec::with_capacity(pixel_count);
        let mut color_x = Vec::with_capacity(pixel_count);
        let mut color_y = Vec::with_capacity(pixel_count);

        for y in 0..height {
            for x in 0..width {
                let (mx, my) = distort(ir, x as f32, y as f32);
                let ix = (mx + 0.5).floor();
                let iy = (my + 0.5).floor();
                let index = (ix >= 0.0 && iy >= 0.0 && ix < width as f32 && iy < height as f32)
                    .then(|| iy as usize * width as usize + ix as usize);
                distort_index.push(index);

                let (rx, ry) = depth_to_color(ir, color, x as f32, y as f32);
                color_x.push(rx);
                color_y.push((ry + 0.5).floor() as i32);
            }
        }

        Self {
            width,
            height,
            distort_index,
            color_x,
            color_y,
        }
    }
}

/// Apply the IR lens distortion model to an undistorted pixel position
fn distort(ir: &IrParams, x: f32, y: f32) -> (f32, f32) {
    let dx = (x - ir.cx) / ir.fx;
    let dy = (y - ir.cy) / ir.fy;
    let dx2 = dx * dx;
    let dy2 = dy * dy;
    let r2 = dx2 + dy2;
    let dxdy2 = 2.0 * dx * dy;
    let kr = 1.0 + ((ir.k3 * r2 + ir.k2) * r2 + ir.k1) * r2;

    (
        ir.fx * (dx * kr + ir.p2 * (r2 + 2.0 * dx2) + ir.p1 * dxdy2) + ir.cx,
        ir.fy * (dy * kr + ir.p1 * (r2 + 2.0 * dy2) + ir.p2 * dxdy2) + ir.cy,
    )
}

/// Map a depth pixel to the color plane, minus the depth-dependent shift
fn depth_to_color(ir: &IrParams, c: &ColorParams, x: f32, y: f32) -> (f32, f32) {
    let mx = (x - ir.cx) * DEPTH_Q;
    let my = (y - ir.cy) * DEPTH_Q;

    let wx = mx * mx * mx * c.mx_x3y0
        + my * my * my * c.mx_x0y3
        + mx * mx * my * c.mx_x2y1
        + my * my * mx * c.mx_x1y2
        + mx * mx * c.mx_x2y0
        + my * my * c.mx_x0y2
        + mx * my * c.mx_x1y1
        + mx * c.mx_x1y0
        + my * c.mx_x0y1
        + c.mx_x0y0;

    let wy = mx * mx * mx * c.my_x3y0
        + my * my * my * c.my_x0y3
        + mx * mx * my * c.my_x2y1
        + my * my * mx * c.my_x1y2
        + mx * mx * c.my_x2y0
        + my * my * c.my_x0y2
        + mx * my * c.my_x1y1
        + mx * c.my_x1y0
        + my * c.my_x0y1
        + c.my_x0y0;

    (wx / (c.fx * COLOR_Q) - c.shift_m / c.shift_d, wy / COLOR_Q + c.cy)
}
