//! # Sync Engine
//!
//! Synchronized multi-stream acquisition.
//!
//! Responsibilities:
//! - Assemble single device frames into Color + Infrared + Depth bundles
//!   (`SyncMultiFrameListener`)
//! - Wait for a bundle, register it and copy all five payloads into stable
//!   buffers (`FrameSynchronizer`)
//! - Own the pre-sized per-session storage (`FrameBufferSet`)
//!
//! ## Usage
//!
//! ```ignore
//! use sync_engine::{FrameBufferSet, FrameSynchronizer, SyncMultiFrameListener};
//!
//! let listener = Arc::new(SyncMultiFrameListener::new());
//! device.set_color_frame_listener(listener.clone());
//! device.set_ir_and_depth_frame_listener(listener.clone());
//!
//! let mut sync = FrameSynchronizer::new(listener, registration);
//! let geometry = sync.probe(Duration::from_secs(10))?;
//! let mut buffers = FrameBufferSet::with_geometry(geometry)?;
//!
//! loop {
//!     let report = sync.capture_frame(&mut buffers, Duration::from_secs(10))?;
//!     // read buffers.depth(), buffers.registered(), ...
//! }
//! ```

mod buffer;
mod engine;
mod listener;

pub use buffer::FrameBufferSet;
pub use engine::{CaptureReport, FrameSynchronizer, SyncStats};
pub use listener::{ListenerStats, SyncMultiFrameListener};
