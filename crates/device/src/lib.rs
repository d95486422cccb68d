//! # Device
//!
//! Mock implementation of the driver-side services.
//!
//! Responsibilities:
//! - Enumerate and open simulated devices (`MockDriver`)
//! - Stream Color, Infrared and Depth frames from a producer thread into the
//!   registered frame listeners (`MockDevice`)
//! - Apply depth range limits in a software processing backend
//!   (`SoftwareBackend`)
//! - Record lifecycle calls for teardown-order checks (`EventLog`)
//!
//! Failure injection comes from `MockDriverConfig`: zero devices, serials
//! that fail to open, a silent stream, and a reduced backend list.

mod backend;
mod events;
mod mock_device;
mod mock_driver;
mod pattern;

pub use backend::SoftwareBackend;
pub use events::{DeviceEvent, EventLog};
pub use mock_device::MockDevice;
pub use mock_driver::MockDriver;
pub use pattern::{color_pattern, depth_pattern, ir_pattern};
