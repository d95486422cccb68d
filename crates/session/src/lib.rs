//! # Session
//!
//! Session lifecycle for synchronized acquisition.
//!
//! Responsibilities:
//! - Select the processing backend and open the device (`configure`)
//! - Start streams, probe the geometry and size the buffers (`start`)
//! - Drive the frame synchronizer (`capture_frame`, `run`)
//! - Deterministic, idempotent teardown (`stop`, also on drop)
//!
//! ```ignore
//! let token = ShutdownToken::new();
//! install_signal_handler(&token)?;
//!
//! let mut session = Session::new(driver, config);
//! session.configure()?;
//! session.start()?;
//! session.run(&token, None, |report, buffers| {
//!     // consume buffers.depth(), buffers.registered(), ...
//! })?;
//! session.stop()?;
//! ```

mod backend;
mod error;
mod session;
mod shutdown;

pub use backend::BackendFactory;
pub use error::{Result, SessionError};
pub use session::{LoopStats, RegistrationFactory, SelftestReport, Session, SessionState};
pub use shutdown::{install_signal_handler, ShutdownToken};
