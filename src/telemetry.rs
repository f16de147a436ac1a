//! Shared telemetry state for all relay loops
//!
//! Every long-running loop (bridge, arbiter, camera feed) publishes into
//! this aggregate and the dashboard collaborator reads it back through
//! [`TelemetryState::snapshot`] and [`TelemetryState::logs_since`]. A single
//! coarse mutex guards the whole aggregate; updates are brief and the lock
//! is never held across blocking I/O. Each counter has exactly one writer.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Bounded log ring capacity
pub const LOG_CAPACITY: usize = 1000;

/// Link is considered alive while the last frame is younger than this
pub const LINK_ALIVE_SECS: f64 = 1.0;

/// Age reported before any frame has been received
const NEVER_AGE_SECS: f64 = 9999.0;

/// Servo target bounds in degrees; out-of-range commands are clamped
pub const SERVO_MIN_DEG: f32 = 0.0;
pub const SERVO_MAX_DEG: f32 = 180.0;

/// Fixed set of log source tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogSource {
    /// The relay daemon itself
    Pi,
    /// RC frame milestones
    Rc,
    /// Lines from the downstream vehicle controller
    Esp32,
    /// Camera pipeline
    Cam,
    /// Digital output / servo subsystem
    Gpio,
}

/// One immutable entry in the log ring
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Monotonically increasing id, starts at 1
    pub id: u64,
    /// Microseconds since the unix epoch
    pub ts_us: u64,
    pub src: LogSource,
    pub msg: String,
}

/// Point-in-time read of the whole aggregate
#[derive(Debug, Clone, Serialize)]
pub struct TelemetrySnapshot {
    pub link_alive: bool,
    pub last_frame_age_secs: f64,
    pub last_sender: String,
    pub frames_received: u64,
    pub frames_forwarded: u64,
    pub frames_invalid: u64,
    pub uart_rx_lines: u64,
    pub uart_tx_errors: u64,
    pub uart_open: bool,
    pub camera_ok: bool,
    pub momentary_active: bool,
    pub blink_enabled: bool,
    pub output_level: bool,
    pub servo_targets: HashMap<String, f32>,
}

struct Inner {
    last_frame_at: Option<Instant>,
    last_sender: String,
    frames_received: u64,
    frames_forwarded: u64,
    frames_invalid: u64,
    uart_rx_lines: u64,
    uart_tx_errors: u64,
    uart_open: bool,
    camera_ok: bool,
    momentary_active: bool,
    blink_enabled: bool,
    output_level: bool,
    servo_targets: HashMap<String, f32>,
    logs: VecDeque<LogEntry>,
    next_log_id: u64,
}

/// Concurrency-safe telemetry aggregate shared by all loops
pub struct TelemetryState {
    inner: Mutex<Inner>,
}

impl TelemetryState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                last_frame_at: None,
                last_sender: String::new(),
                frames_received: 0,
                frames_forwarded: 0,
                frames_invalid: 0,
                uart_rx_lines: 0,
                uart_tx_errors: 0,
                uart_open: false,
                camera_ok: false,
                momentary_active: false,
                blink_enabled: false,
                output_level: false,
                servo_targets: HashMap::new(),
                logs: VecDeque::with_capacity(LOG_CAPACITY),
                next_log_id: 1,
            }),
        }
    }

    // ------------------------------------------------------------------
    // Log ring
    // ------------------------------------------------------------------

    /// Append a log entry, evicting the oldest on overflow
    pub fn add_log(&self, src: LogSource, msg: impl Into<String>) {
        let mut inner = self.inner.lock();
        if inner.logs.len() == LOG_CAPACITY {
            inner.logs.pop_front();
        }
        let entry = LogEntry {
            id: inner.next_log_id,
            ts_us: now_ts_us(),
            src,
            msg: msg.into(),
        };
        inner.next_log_id += 1;
        inner.logs.push_back(entry);
    }

    /// Return all entries with id strictly greater than `since_id`,
    /// in ascending id order; empty means "no new entries"
    pub fn logs_since(&self, since_id: u64) -> Vec<LogEntry> {
        let inner = self.inner.lock();
        inner
            .logs
            .iter()
            .filter(|e| e.id > since_id)
            .cloned()
            .collect()
    }

    // ------------------------------------------------------------------
    // Bridge-owned counters
    // ------------------------------------------------------------------

    /// Record a valid received frame; returns the new receive count
    pub fn record_frame(&self, sender: String) -> u64 {
        let mut inner = self.inner.lock();
        inner.last_frame_at = Some(Instant::now());
        inner.last_sender = sender;
        inner.frames_received += 1;
        inner.frames_received
    }

    /// Record a datagram that failed frame validation
    pub fn record_invalid_frame(&self) {
        self.inner.lock().frames_invalid += 1;
    }

    /// Record a frame forwarded to the serial sink
    pub fn record_uart_tx(&self) {
        self.inner.lock().frames_forwarded += 1;
    }

    /// Record a swallowed serial write failure
    pub fn record_uart_tx_error(&self) {
        self.inner.lock().uart_tx_errors += 1;
    }

    /// Record a completed diagnostic line from the downstream controller
    pub fn record_uart_line(&self) {
        self.inner.lock().uart_rx_lines += 1;
    }

    pub fn set_uart_open(&self, open: bool) {
        self.inner.lock().uart_open = open;
    }

    // ------------------------------------------------------------------
    // Camera-owned flags
    // ------------------------------------------------------------------

    pub fn set_camera_ok(&self, ok: bool) {
        self.inner.lock().camera_ok = ok;
    }

    // ------------------------------------------------------------------
    // Command interface (dashboard collaborator -> arbiter)
    // ------------------------------------------------------------------

    pub fn set_momentary(&self, active: bool) {
        self.inner.lock().momentary_active = active;
    }

    pub fn set_blink(&self, enabled: bool) {
        self.inner.lock().blink_enabled = enabled;
    }

    /// Current (momentary, blink) requests, read by the arbiter each tick
    pub fn output_requests(&self) -> (bool, bool) {
        let inner = self.inner.lock();
        (inner.momentary_active, inner.blink_enabled)
    }

    /// Published by the arbiter every tick, even when unchanged
    pub fn set_output_level(&self, high: bool) {
        self.inner.lock().output_level = high;
    }

    /// Set a named servo target; out-of-range values are clamped
    pub fn set_servo_target(&self, name: &str, degrees: f32) {
        let clamped = degrees.clamp(SERVO_MIN_DEG, SERVO_MAX_DEG);
        self.inner
            .lock()
            .servo_targets
            .insert(name.to_string(), clamped);
    }

    /// Read back a servo target
    pub fn servo_target(&self, name: &str) -> Option<f32> {
        self.inner.lock().servo_targets.get(name).copied()
    }

    // ------------------------------------------------------------------
    // Status query
    // ------------------------------------------------------------------

    /// Point-in-time snapshot for the status endpoint
    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot_at(Instant::now())
    }

    fn snapshot_at(&self, now: Instant) -> TelemetrySnapshot {
        let inner = self.inner.lock();
        let age = inner
            .last_frame_at
            .map(|t| now.duration_since(t).as_secs_f64())
            .unwrap_or(NEVER_AGE_SECS);
        TelemetrySnapshot {
            link_alive: age < LINK_ALIVE_SECS,
            last_frame_age_secs: age,
            last_sender: inner.last_sender.clone(),
            frames_received: inner.frames_received,
            frames_forwarded: inner.frames_forwarded,
            frames_invalid: inner.frames_invalid,
            uart_rx_lines: inner.uart_rx_lines,
            uart_tx_errors: inner.uart_tx_errors,
            uart_open: inner.uart_open,
            camera_ok: inner.camera_ok,
            momentary_active: inner.momentary_active,
            blink_enabled: inner.blink_enabled,
            output_level: inner.output_level,
            servo_targets: inner.servo_targets.clone(),
        }
    }
}

impl Default for TelemetryState {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ts_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}
