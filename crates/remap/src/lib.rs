//! # Remap
//!
//! Cross-generation geometry helpers applied by the caller to synchronized
//! output:
//! - `remap_to_legacy_geometry`: place a registered frame inside the legacy
//!   640x480 canvas at the fixed (64, 28) offset
//! - `mirror_horizontally`: reverse each row of a depth buffer in place
//!
//! Every function checks its arguments before touching a pixel.
//!
//! ```ignore
//! let mut legacy = LegacyFrame::new(LegacyGeometry::KINECT_V1);
//! legacy.remap_from(buffers.depth(), buffers.registered(), 512, 424)?;
//! ```

mod legacy;
mod mirror;

pub use contracts::LegacyGeometry;
pub use legacy::{remap_to_legacy_geometry, remap_with, LegacyFrame};
pub use mirror::mirror_horizontally;
