//! Camera calibration parameters read from the device
//!
//! The registration engine consumes these once, right after the device is
//! opened.

use serde::{Deserialize, Serialize};

/// IR (depth) camera intrinsics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrParams {
    /// Focal length x (pixel)
    pub fx: f32,
    /// Focal length y (pixel)
    pub fy: f32,
    /// Principal point x (pixel)
    pub cx: f32,
    /// Principal point y (pixel)
    pub cy: f32,
    /// Radial distortion, 1st order
    pub k1: f32,
    /// Radial distortion, 2nd order
    pub k2: f32,
    /// Radial distortion, 3rd order
    pub k3: f32,
    /// Tangential distortion
    pub p1: f32,
    /// Tangential distortion
    pub p2: f32,
}

impl Default for IrParams {
    fn default() -> Self {
        Self {
            fx: 365.456,
            fy: 365.456,
            cx: 254.878,
            cy: 205.395,
            k1: 0.090_547,
            k2: -0.268_19,
            k3: 0.095_086,
            p1: 0.0,
            p2: 0.0,
        }
    }
}

/// Color camera intrinsics plus the depth-to-color mapping polynomial
///
/// `mx_*` / `my_*` are the coefficients of a third-order polynomial in the
/// scaled depth-pixel coordinates; they cannot be used as a matrix transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorParams {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,

    pub shift_d: f32,
    pub shift_m: f32,

    pub mx_x3y0: f32,
    pub mx_x0y3: f32,
    pub mx_x2y1: f32,
    pub mx_x1y2: f32,
    pub mx_x2y0: f32,
    pub mx_x0y2: f32,
    pub mx_x1y1: f32,
    pub mx_x1y0: f32,
    pub mx_x0y1: f32,
    pub mx_x0y0: f32,

    pub my_x3y0: f32,
    pub my_x0y3: f32,
    pub my_x2y1: f32,
    pub my_x1y2: f32,
    pub my_x2y0: f32,
    pub my_x0y2: f32,
    pub my_x1y1: f32,
    pub my_x1y0: f32,
    pub my_x0y1: f32,
    pub my_x0y0: f32,
}

impl Default for ColorParams {
    /// First-order approximation of a factory calibration
    fn default() -> Self {
        Self {
            fx: 1081.372,
            fy: 1081.372,
            cx: 959.5,
            cy: 539.5,
            shift_d: 863.0,
            shift_m: 52.0,
            mx_x3y0: 0.0,
            mx_x0y3: 0.0,
            mx_x2y1: 0.0,
            mx_x1y2: 0.0,
            mx_x2y0: 0.0,
            mx_x0y2: 0.0,
            mx_x1y1: 0.0,
            mx_x1y0: 0.6507,
            mx_x0y1: 0.0,
            mx_x0y0: 0.0,
            my_x3y0: 0.0,
            my_x0y3: 0.0,
            my_x2y1: 0.0,
            my_x1y2: 0.0,
            my_x2y0: 0.0,
            my_x0y2: 0.0,
            my_x1y1: 0.0,
            my_x1y0: 0.0,
            my_x0y1: 0.6507,
            my_x0y0: 0.0,
        }
    }
}
