//! Digital output drivers
//!
//! The arbiter drives a [`DigitalOutput`] without knowing whether real
//! hardware is attached; the driver is selected once at startup.

use crate::error::Result;
use std::fs;
use std::path::PathBuf;

/// Writable digital output capability
pub trait DigitalOutput: Send {
    /// Drive the output high or low
    fn set_level(&mut self, high: bool) -> Result<()>;
}

impl DigitalOutput for Box<dyn DigitalOutput> {
    fn set_level(&mut self, high: bool) -> Result<()> {
        (**self).set_level(high)
    }
}

/// No-op driver for hosts without GPIO hardware
///
/// Level transitions are logged at debug so arbitration remains
/// observable during development.
pub struct SimulatedOutput {
    level: bool,
}

impl SimulatedOutput {
    pub fn new() -> Self {
        Self { level: false }
    }
}

impl Default for SimulatedOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitalOutput for SimulatedOutput {
    fn set_level(&mut self, high: bool) -> Result<()> {
        if high != self.level {
            log::debug!(
                "simulated output -> {}",
                if high { "HIGH" } else { "LOW" }
            );
            self.level = high;
        }
        Ok(())
    }
}

/// Sysfs-backed GPIO driver for the real output pin
pub struct SysfsOutput {
    value_path: PathBuf,
}

impl SysfsOutput {
    /// Export the pin (if needed) and configure it as an output
    pub fn open(pin: u32) -> Result<Self> {
        let base = PathBuf::from("/sys/class/gpio");
        let pin_dir = base.join(format!("gpio{}", pin));

        if !pin_dir.exists() {
            fs::write(base.join("export"), pin.to_string())?;
        }
        fs::write(pin_dir.join("direction"), "out")?;

        log::info!("GPIO {} configured as output", pin);
        Ok(Self {
            value_path: pin_dir.join("value"),
        })
    }
}

impl DigitalOutput for SysfsOutput {
    fn set_level(&mut self, high: bool) -> Result<()> {
        fs::write(&self.value_path, if high { "1" } else { "0" })?;
        Ok(())
    }
}
