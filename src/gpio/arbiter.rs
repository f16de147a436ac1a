//! Priority arbitration for the shared digital output
//!
//! Two requests compete for one pin: a momentary hold and a periodic
//! blink. Priority is strict: momentary forces the level high, otherwise
//! blink follows the wall-clock phase, otherwise the level is low. The
//! resolved level is written to the pin and published into telemetry on
//! every tick, even when unchanged, because consumers poll rather than
//! listen for edges.

use super::pin::DigitalOutput;
use crate::telemetry::{LogSource, TelemetryState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Fixed update rate: 20 Hz
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// The blink phase flips every half period of wall-clock time,
/// independent of the arbiter's own update rate
pub const BLINK_HALF_PERIOD: Duration = Duration::from_millis(500);

/// Rate-limit bucket for driver fault logs
const FAULT_BUCKET_SECS: u64 = 5;

/// Resolve the output level by strict priority
#[inline]
pub fn resolve_level(momentary: bool, blink: bool, phase_high: bool) -> bool {
    if momentary {
        true
    } else if blink {
        phase_high
    } else {
        false
    }
}

/// Blink phase for a given elapsed wall-clock time
#[inline]
pub fn blink_phase(elapsed: Duration) -> bool {
    (elapsed.as_millis() / BLINK_HALF_PERIOD.as_millis()) % 2 == 0
}

/// Fixed-rate arbitration loop over one digital output
pub struct OutputArbiter<O: DigitalOutput> {
    output: O,
    state: Arc<TelemetryState>,
    started: Instant,
    last_fault_bucket: Option<u64>,
}

impl<O: DigitalOutput> OutputArbiter<O> {
    pub fn new(output: O, state: Arc<TelemetryState>) -> Self {
        Self {
            output,
            state,
            started: Instant::now(),
            last_fault_bucket: None,
        }
    }

    /// Run at the fixed tick rate until shutdown, then leave the pin low
    pub fn run(&mut self, shutdown: &AtomicBool) {
        log::info!("Output arbiter running at 20 Hz");

        while !shutdown.load(Ordering::Relaxed) {
            self.tick(Instant::now());
            std::thread::sleep(TICK_INTERVAL);
        }

        if let Err(e) = self.output.set_level(false) {
            log::warn!("Failed to lower output on shutdown: {}", e);
        }
        self.state.set_output_level(false);
        log::info!("Output arbiter exiting");
    }

    /// One arbitration step at the given instant
    fn tick(&mut self, now: Instant) {
        let (momentary, blink) = self.state.output_requests();
        let phase = blink_phase(now.duration_since(self.started));
        let level = resolve_level(momentary, blink, phase);

        if let Err(e) = self.output.set_level(level) {
            let bucket = now.duration_since(self.started).as_secs() / FAULT_BUCKET_SECS;
            if self.last_fault_bucket != Some(bucket) {
                self.last_fault_bucket = Some(bucket);
                self.state
                    .add_log(LogSource::Gpio, format!("output write failed: {}", e));
            }
        }

        self.state.set_output_level(level);
    }
}
