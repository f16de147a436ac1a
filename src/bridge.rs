//! UDP-to-UART relay bridge
//!
//! Receives raw 32-byte iBUS frames over UDP, validates them, and forwards
//! the bytes verbatim to the vehicle controller's serial port. Diagnostic
//! text coming back on the same port is split into lines and published to
//! the shared log ring. Liveness is evaluated every iteration; "waiting"
//! and "signal lost" conditions are logged at most once per 5-second
//! bucket. The bridge never sends a failsafe frame itself: the downstream
//! controller's own watchdog detects frame silence.

use crate::ibus::ControlFrame;
use crate::telemetry::{LogSource, TelemetryState};
use crate::transport::Transport;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Socket poll timeout per loop iteration
pub const POLL_TIMEOUT: Duration = Duration::from_millis(20);

/// Maximum datagram size read from the socket
pub const MAX_DATAGRAM: usize = 2048;

/// Serial line accumulator cap; cleared on overflow to bound memory
pub const MAX_LINE_LEN: usize = 256;

/// Liveness threshold after the last valid frame
pub const FAILSAFE_TIMEOUT: Duration = Duration::from_millis(500);

/// Rate-limit bucket width for repeated condition logs
pub const LOG_BUCKET_SECS: u64 = 5;

/// Every Nth relayed frame emits a milestone log entry
const FRAME_LOG_INTERVAL: u64 = 50;

/// The relay bridge event loop state
///
/// Generic over [`Transport`] so tests can drive it with a mock serial
/// port. `uart` is `None` when the port failed to open at startup; the
/// bridge then runs with UDP reception and logging only.
pub struct RelayBridge<T: Transport> {
    uart: Option<T>,
    state: Arc<TelemetryState>,
    line_buf: Vec<u8>,
    last_rx: Option<Instant>,
    started: Instant,
    last_liveness_bucket: Option<u64>,
    last_uart_err_bucket: Option<u64>,
}

impl<T: Transport> RelayBridge<T> {
    pub fn new(uart: Option<T>, state: Arc<TelemetryState>) -> Self {
        Self {
            uart,
            state,
            line_buf: Vec::with_capacity(MAX_LINE_LEN),
            last_rx: None,
            started: Instant::now(),
            last_liveness_bucket: None,
            last_uart_err_bucket: None,
        }
    }

    /// Run the event loop until the shutdown flag is set
    ///
    /// The socket must already be bound; bind failure is the caller's
    /// fatal error. Per-iteration I/O faults are logged (rate-limited)
    /// and never terminate the loop.
    pub fn run(&mut self, socket: &UdpSocket, shutdown: &AtomicBool) -> crate::error::Result<()> {
        socket.set_read_timeout(Some(POLL_TIMEOUT))?;
        let mut buf = [0u8; MAX_DATAGRAM];

        log::info!("Bridge loop running, awaiting iBUS frames");

        while !shutdown.load(Ordering::Relaxed) {
            match socket.recv_from(&mut buf) {
                Ok((n, addr)) => self.handle_datagram_at(&buf[..n], addr, Instant::now()),
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => {
                    self.state
                        .add_log(LogSource::Pi, format!("UDP receive error: {}", e));
                }
            }

            self.drain_uart_input();
            self.evaluate_liveness(Instant::now());
        }

        log::info!("Bridge loop exiting");
        Ok(())
    }

    /// Process one datagram: validate, count, forward verbatim
    fn handle_datagram_at(&mut self, data: &[u8], addr: SocketAddr, now: Instant) {
        if ControlFrame::decode(data).is_none() {
            // Malformed frames are discarded silently (counted, not
            // logged) so a noisy sender cannot flood the log ring.
            self.state.record_invalid_frame();
            return;
        }

        self.last_rx = Some(now);
        let count = self.state.record_frame(addr.to_string());

        if let Some(uart) = &mut self.uart {
            // Write failures are swallowed and counted; the bridge keeps
            // running so it can resume once the device reconnects.
            match uart.write(data).and_then(|_| uart.flush()) {
                Ok(()) => self.state.record_uart_tx(),
                Err(_) => self.state.record_uart_tx_error(),
            }
        }

        if count == 1 {
            log::info!("First iBUS frame received from {}", addr);
            self.state
                .add_log(LogSource::Rc, format!("First UDP frame from {}", addr));
        } else if count % FRAME_LOG_INTERVAL == 0 {
            self.state.add_log(
                LogSource::Rc,
                format!("Relayed {} iBUS frames to controller", FRAME_LOG_INTERVAL),
            );
        }
    }

    /// Drain available serial bytes into the line accumulator
    fn drain_uart_input(&mut self) {
        let Some(uart) = &mut self.uart else {
            return;
        };

        let available = match uart.available() {
            Ok(n) => n,
            Err(e) => {
                self.uart_fault(format!("UART status error: {}", e));
                return;
            }
        };
        if available == 0 {
            return;
        }

        let mut chunk = [0u8; 512];
        let n = match uart.read(&mut chunk) {
            Ok(n) => n,
            Err(e) => {
                self.uart_fault(format!("UART read error: {}", e));
                return;
            }
        };

        for &b in &chunk[..n] {
            if b == b'\n' {
                let line = String::from_utf8_lossy(&self.line_buf).trim().to_string();
                if !line.is_empty() {
                    self.state.add_log(LogSource::Esp32, line);
                    self.state.record_uart_line();
                }
                self.line_buf.clear();
            } else if b != b'\r' {
                self.line_buf.push(b);
                if self.line_buf.len() > MAX_LINE_LEN {
                    self.line_buf.clear();
                }
            }
        }
    }

    /// Emit rate-limited "waiting" / "signal lost" log entries
    ///
    /// The limiter compares bucket timestamps rather than counting, so a
    /// link that recovers and drops again naturally resets it.
    fn evaluate_liveness(&mut self, now: Instant) {
        let bucket = now.duration_since(self.started).as_secs() / LOG_BUCKET_SECS;

        match self.last_rx {
            None => {
                if self.last_liveness_bucket != Some(bucket) {
                    self.last_liveness_bucket = Some(bucket);
                    self.state
                        .add_log(LogSource::Pi, "Waiting for first RC frame from sender");
                }
            }
            Some(last) => {
                if now.duration_since(last) > FAILSAFE_TIMEOUT
                    && self.last_liveness_bucket != Some(bucket)
                {
                    self.last_liveness_bucket = Some(bucket);
                    // No sentinel frame is sent; the downstream watchdog
                    // enters failsafe on its own once frames stop.
                    self.state
                        .add_log(LogSource::Pi, "RC signal lost, downstream failsafe active");
                }
            }
        }
    }

    /// Rate-limited device fault logging
    fn uart_fault(&mut self, msg: String) {
        let bucket = self.started.elapsed().as_secs() / LOG_BUCKET_SECS;
        if self.last_uart_err_bucket != Some(bucket) {
            self.last_uart_err_bucket = Some(bucket);
            self.state.add_log(LogSource::Pi, msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ibus::{ControlFrame, CHANNEL_COUNT};
    use crate::telemetry::LogSource;
    use crate::transport::MockTransport;

    fn frame_bytes() -> Vec<u8> {
        ControlFrame::new([1500u16; CHANNEL_COUNT]).encode().to_vec()
    }

    fn addr() -> SocketAddr {
        "10.0.0.2:5000".parse().unwrap()
    }

    fn bridge_with_mock() -> (RelayBridge<MockTransport>, MockTransport, Arc<TelemetryState>) {
        let state = Arc::new(TelemetryState::new());
        let uart = MockTransport::new();
        let bridge = RelayBridge::new(Some(uart.clone()), Arc::clone(&state));
        (bridge, uart, state)
    }

    #[test]
    fn test_valid_frame_forwarded_verbatim() {
        let (mut bridge, uart, state) = bridge_with_mock();
        let bytes = frame_bytes();

        bridge.handle_datagram_at(&bytes, addr(), Instant::now());

        assert_eq!(uart.written(), bytes);
        let snap = state.snapshot();
        assert_eq!(snap.frames_received, 1);
        assert_eq!(snap.frames_forwarded, 1);
        assert_eq!(snap.last_sender, "10.0.0.2:5000");
    }

    #[test]
    fn test_invalid_frame_discarded() {
        let (mut bridge, uart, state) = bridge_with_mock();

        let mut corrupt = frame_bytes();
        corrupt[5] ^= 0xFF;
        bridge.handle_datagram_at(&corrupt, addr(), Instant::now());
        bridge.handle_datagram_at(&[0u8; 10], addr(), Instant::now());

        assert!(uart.written().is_empty());
        let snap = state.snapshot();
        assert_eq!(snap.frames_received, 0);
        assert_eq!(snap.frames_invalid, 2);
        // Discarded silently: no log entries for protocol faults
        assert!(state.logs_since(0).is_empty());
    }

    #[test]
    fn test_write_failure_swallowed_and_counted() {
        let (mut bridge, uart, state) = bridge_with_mock();
        uart.set_fail_writes(true);

        bridge.handle_datagram_at(&frame_bytes(), addr(), Instant::now());

        let snap = state.snapshot();
        assert_eq!(snap.frames_received, 1);
        assert_eq!(snap.frames_forwarded, 0);
        assert_eq!(snap.uart_tx_errors, 1);
    }

    #[test]
    fn test_no_uart_still_counts_frames() {
        let state = Arc::new(TelemetryState::new());
        let mut bridge: RelayBridge<MockTransport> = RelayBridge::new(None, Arc::clone(&state));

        bridge.handle_datagram_at(&frame_bytes(), addr(), Instant::now());

        let snap = state.snapshot();
        assert_eq!(snap.frames_received, 1);
        assert_eq!(snap.frames_forwarded, 0);
    }

    #[test]
    fn test_first_frame_milestone_logged() {
        let (mut bridge, _uart, state) = bridge_with_mock();
        bridge.handle_datagram_at(&frame_bytes(), addr(), Instant::now());

        let logs = state.logs_since(0);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].src, LogSource::Rc);
        assert!(logs[0].msg.contains("First UDP frame"));
    }

    #[test]
    fn test_uart_lines_accumulated() {
        let (mut bridge, uart, state) = bridge_with_mock();
        uart.inject_read(b"boot ok\r\nvoltage 12.1\n");

        bridge.drain_uart_input();

        let logs = state.logs_since(0);
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].src, LogSource::Esp32);
        assert_eq!(logs[0].msg, "boot ok");
        assert_eq!(logs[1].msg, "voltage 12.1");
        assert_eq!(state.snapshot().uart_rx_lines, 2);
    }

    #[test]
    fn test_partial_line_waits_for_terminator() {
        let (mut bridge, uart, state) = bridge_with_mock();
        uart.inject_read(b"half a li");
        bridge.drain_uart_input();
        assert!(state.logs_since(0).is_empty());

        uart.inject_read(b"ne\n");
        bridge.drain_uart_input();
        let logs = state.logs_since(0);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].msg, "half a line");
    }

    #[test]
    fn test_line_overflow_clears_buffer() {
        let (mut bridge, uart, state) = bridge_with_mock();
        let total = 300;
        uart.inject_read(&vec![b'x'; total]);
        bridge.drain_uart_input();

        // The accumulator was cleared once it exceeded MAX_LINE_LEN, so a
        // terminator now only completes the bytes pushed after the clear.
        uart.inject_read(b"\n");
        bridge.drain_uart_input();

        let logs = state.logs_since(0);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].msg.len(), total - (MAX_LINE_LEN + 1));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let (mut bridge, uart, state) = bridge_with_mock();
        uart.inject_read(b"\n\r\n  \nreal\n");
        bridge.drain_uart_input();

        let logs = state.logs_since(0);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].msg, "real");
    }

    #[test]
    fn test_waiting_log_rate_limited() {
        let (mut bridge, _uart, state) = bridge_with_mock();
        let t0 = bridge.started;

        // Many iterations inside the same 5-second bucket
        for i in 0..100 {
            bridge.evaluate_liveness(t0 + Duration::from_millis(20 * i));
        }
        assert_eq!(state.logs_since(0).len(), 1);

        // Next bucket logs again
        bridge.evaluate_liveness(t0 + Duration::from_secs(LOG_BUCKET_SECS));
        assert_eq!(state.logs_since(0).len(), 2);
    }

    #[test]
    fn test_signal_lost_after_failsafe_timeout() {
        let (mut bridge, _uart, state) = bridge_with_mock();
        let t0 = bridge.started;

        bridge.handle_datagram_at(&frame_bytes(), addr(), t0);
        let baseline = state.logs_since(0).len();

        // Within the threshold: nothing logged
        bridge.evaluate_liveness(t0 + Duration::from_millis(400));
        assert_eq!(state.logs_since(0).len(), baseline);

        // Past the threshold: one entry per bucket
        bridge.evaluate_liveness(t0 + Duration::from_millis(600));
        bridge.evaluate_liveness(t0 + Duration::from_millis(900));
        let logs = state.logs_since(0);
        let lost: Vec<_> = logs.iter().filter(|e| e.msg.contains("signal lost")).collect();
        assert_eq!(lost.len(), 1);
    }

    #[test]
    fn test_uart_fault_rate_limited() {
        let (mut bridge, uart, state) = bridge_with_mock();
        uart.set_fail_reads(true);
        uart.inject_read(b"data");

        for _ in 0..10 {
            bridge.drain_uart_input();
        }
        let faults: Vec<_> = state
            .logs_since(0)
            .into_iter()
            .filter(|e| e.msg.contains("UART"))
            .collect();
        assert_eq!(faults.len(), 1);
    }
}
