//! Digital output capability and priority arbitration

mod arbiter;
mod pin;

pub use arbiter::{blink_phase, resolve_level, OutputArbiter, BLINK_HALF_PERIOD, TICK_INTERVAL};
pub use pin::{DigitalOutput, SimulatedOutput, SysfsOutput};
