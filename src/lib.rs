//! setu-relay - UDP-to-UART iBUS relay for the underwater rover
//!
//! Bridges a remote-control transmitter to the vehicle controller and
//! relays diagnostics back to the operator console:
//!
//! - [`ibus`]: 32-byte control-frame codec and stream synchronization
//! - [`bridge`]: UDP receive loop forwarding validated frames to UART
//! - [`camera`]: MJPEG frame extraction from an external encoder process
//! - [`gpio`]: digital-output priority arbitration (momentary vs. blink)
//! - [`telemetry`]: shared counters, health flags, and the bounded log ring

pub mod app;
pub mod bridge;
pub mod camera;
pub mod config;
pub mod error;
pub mod gpio;
pub mod ibus;
pub mod telemetry;
pub mod transport;

pub use config::AppConfig;
pub use error::{Error, Result};
