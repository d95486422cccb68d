//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the workspace: stream
//! frames, sensor geometry, camera parameters, the driver-side service traits
//! and the unified error type. Business crates depend on this crate only,
//! never on each other's internals.
//!
//! ## Time Model
//! - Frame timestamps are raw device ticks (`u32`, 0.1 ms per tick)
//! - `sequence` is per-stream and only used for ordering/diagnostics

mod camera;
mod config;
mod driver;
mod error;
mod frame;
mod geometry;

pub use camera::{ColorParams, IrParams};
pub use config::*;
pub use driver::{
    BackendKind, DepthProcessorConfig, Device, DeviceDriver, FrameListener, ProcessingBackend,
    Registration, SharedListener,
};
pub use error::*;
pub use frame::*;
pub use geometry::*;
