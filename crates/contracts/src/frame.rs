//! StreamFrame / FrameBundle - driver output
//!
//! Raw frames as handed over by the frame listener, and the registered views
//! derived from them.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Primary stream kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Color,
    Infrared,
    Depth,
}

impl StreamKind {
    /// All primary streams, in bundle order
    pub const ALL: [StreamKind; 3] = [StreamKind::Color, StreamKind::Infrared, StreamKind::Depth];

    /// Stable slot index (0..3)
    #[inline]
    pub fn index(self) -> usize {
        match self {
            StreamKind::Color => 0,
            StreamKind::Infrared => 1,
            StreamKind::Depth => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StreamKind::Color => "color",
            StreamKind::Infrared => "infrared",
            StreamKind::Depth => "depth",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame of a single stream
///
/// Owned by the driver until the bundle it belongs to is released.
#[derive(Debug, Clone)]
pub struct StreamFrame {
    /// Stream kind
    pub kind: StreamKind,

    /// Width in pixels
    pub width: u32,

    /// Height in pixels
    pub height: u32,

    /// Bytes per pixel (4 for BGRX color and for f32 IR/depth)
    pub bytes_per_pixel: u32,

    /// Device timestamp (0.1 ms ticks)
    pub timestamp: u32,

    /// Per-stream sequence number
    pub sequence: u32,

    /// Raw pixel payload (zero-copy)
    pub data: Bytes,
}

impl StreamFrame {
    /// Payload length implied by the frame header
    #[inline]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_pixel as usize
    }

    /// Whether the payload length agrees with the header
    #[inline]
    pub fn is_consistent(&self) -> bool {
        self.data.len() == self.expected_len()
    }

    /// Decode an f32 payload (IR/depth); the payload need not be aligned
    pub fn f32_samples(&self) -> Vec<f32> {
        self.data
            .chunks_exact(4)
            .map(bytemuck::pod_read_unaligned::<f32>)
            .collect()
    }
}

/// Safely convert slice implementing bytemuck::Pod to bytes::Bytes
#[inline]
pub fn pod_slice_to_bytes<T: bytemuck::Pod>(slice: &[T]) -> Bytes {
    Bytes::copy_from_slice(bytemuck::cast_slice(slice))
}

/// One matched set of Color + Infrared + Depth frames
///
/// Not `Clone`: a bundle has exactly one holder between
/// `wait_for_bundle` and `release`.
#[derive(Debug)]
pub struct FrameBundle {
    /// Listener-assigned bundle id (monotonically increasing)
    pub id: u64,
    pub color: StreamFrame,
    pub infrared: StreamFrame,
    pub depth: StreamFrame,
}

impl FrameBundle {
    /// Frame of the given kind
    pub fn frame(&self, kind: StreamKind) -> &StreamFrame {
        match kind {
            StreamKind::Color => &self.color,
            StreamKind::Infrared => &self.infrared,
            StreamKind::Depth => &self.depth,
        }
    }
}

/// Output of the registration engine for one bundle
#[derive(Debug, Clone)]
pub struct RegisteredView {
    /// Color sampled into the depth geometry (4 bytes per pixel)
    pub registered: StreamFrame,

    /// Depth with lens distortion removed (f32 per pixel)
    pub undistorted: StreamFrame,
}

/// Per-stream timestamps of the last successful capture
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub color: u32,
    pub infrared: u32,
    pub depth: u32,
}

impl Timestamps {
    pub fn get(&self, kind: StreamKind) -> u32 {
        match kind {
            StreamKind::Color => self.color,
            StreamKind::Infrared => self.infrared,
            StreamKind::Depth => self.depth,
        }
    }

    pub fn set(&mut self, kind: StreamKind, timestamp: u32) {
        match kind {
            StreamKind::Color => self.color = timestamp,
            StreamKind::Infrared => self.infrared = timestamp,
            StreamKind::Depth => self.depth = timestamp,
        }
    }

    /// Every stream is at or after `previous`
    pub fn not_before(&self, previous: &Timestamps) -> bool {
        StreamKind::ALL
            .iter()
            .all(|&kind| self.get(kind) >= previous.get(kind))
    }
}
