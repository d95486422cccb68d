//! SensorGeometry - probe output
//!
//! Stream dimensions learned once from the probe bundle, and the fixed
//! placement of the newer sensor's field of view inside the legacy canvas.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{FrameBundle, RegisteredView, StreamFrame};

/// Buffer slot inside the frame buffer set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferKind {
    /// Color bytes (BGRX)
    Rgb,
    /// Infrared bytes
    Ir,
    /// Depth samples (f32)
    Depth,
    /// Color registered into depth geometry
    Registered,
    /// Undistorted depth bytes
    Undistorted,
}

impl BufferKind {
    pub const ALL: [BufferKind; 5] = [
        BufferKind::Rgb,
        BufferKind::Ir,
        BufferKind::Depth,
        BufferKind::Registered,
        BufferKind::Undistorted,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BufferKind::Rgb => "rgb",
            BufferKind::Ir => "ir",
            BufferKind::Depth => "depth",
            BufferKind::Registered => "registered",
            BufferKind::Undistorted => "undistorted",
        }
    }
}

impl fmt::Display for BufferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dimensions of a single stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamGeometry {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
}

impl StreamGeometry {
    pub const fn new(width: u32, height: u32, bytes_per_pixel: u32) -> Self {
        Self {
            width,
            height,
            bytes_per_pixel,
        }
    }

    /// Geometry as reported by a frame header
    pub fn of(frame: &StreamFrame) -> Self {
        Self::new(frame.width, frame.height, frame.bytes_per_pixel)
    }

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    #[inline]
    pub fn byte_len(&self) -> usize {
        self.pixel_count() * self.bytes_per_pixel as usize
    }
}

impl fmt::Display for StreamGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.bytes_per_pixel)
    }
}

/// Geometry of every stream in a session
///
/// Captured once from the probe bundle; immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorGeometry {
    pub color: StreamGeometry,
    pub infrared: StreamGeometry,
    pub depth: StreamGeometry,
    pub registered: StreamGeometry,
    pub undistorted: StreamGeometry,
}

impl SensorGeometry {
    /// Native Kinect v2 stream layout
    pub const KINECT_V2: SensorGeometry = SensorGeometry {
        color: StreamGeometry::new(1920, 1080, 4),
        infrared: StreamGeometry::new(512, 424, 4),
        depth: StreamGeometry::new(512, 424, 4),
        registered: StreamGeometry::new(512, 424, 4),
        undistorted: StreamGeometry::new(512, 424, 4),
    };

    /// Derive geometry from a probe bundle and its registered view
    pub fn from_probe(bundle: &FrameBundle, view: &RegisteredView) -> Self {
        Self {
            color: StreamGeometry::of(&bundle.color),
            infrared: StreamGeometry::of(&bundle.infrared),
            depth: StreamGeometry::of(&bundle.depth),
            registered: StreamGeometry::of(&view.registered),
            undistorted: StreamGeometry::of(&view.undistorted),
        }
    }

    /// Geometry backing a buffer slot
    pub fn stream(&self, kind: BufferKind) -> StreamGeometry {
        match kind {
            BufferKind::Rgb => self.color,
            BufferKind::Ir => self.infrared,
            BufferKind::Depth => self.depth,
            BufferKind::Registered => self.registered,
            BufferKind::Undistorted => self.undistorted,
        }
    }

    /// Element count of a buffer slot (samples for depth, bytes otherwise)
    pub fn buffer_len(&self, kind: BufferKind) -> usize {
        let stream = self.stream(kind);
        match kind {
            BufferKind::Depth => stream.pixel_count(),
            _ => stream.byte_len(),
        }
    }
}

/// Placement of the newer sensor's image inside the legacy canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyGeometry {
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Horizontal offset of source column 0
    pub offset_x: u32,
    /// Vertical offset of source row 0
    pub offset_y: u32,
}

impl LegacyGeometry {
    /// Kinect v1 canvas: 640x480, source placed at (64, 28)
    pub const KINECT_V1: LegacyGeometry = LegacyGeometry {
        canvas_width: 640,
        canvas_height: 480,
        offset_x: 64,
        offset_y: 28,
    };

    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.canvas_width as usize * self.canvas_height as usize
    }

    /// Whether a `width x height` source fits inside the canvas at the offset
    pub fn fits(&self, width: u32, height: u32) -> bool {
        width as u64 + self.offset_x as u64 <= self.canvas_width as u64
            && height as u64 + self.offset_y as u64 <= self.canvas_height as u64
    }

    /// Canvas index of source pixel `(x, y)`
    #[inline]
    pub fn canvas_index(&self, x: usize, y: usize) -> usize {
        (y + self.offset_y as usize) * self.canvas_width as usize + x + self.offset_x as usize
    }
}

impl Default for LegacyGeometry {
    fn default() -> Self {
        Self::KINECT_V1
    }
}
