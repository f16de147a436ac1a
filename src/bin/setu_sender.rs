//! setu-sender - transmitter-side iBUS uplink
//!
//! Reads iBUS frames from the USB serial receiver attached to the RC
//! transmitter, validates them, and sends the raw 32-byte frames over UDP
//! to the relay daemon at a fixed rate.

use setu_relay::ibus::{ControlFrame, FrameScanner};
use setu_relay::transport::SerialTransport;
use setu_relay::{Error, Result};
use std::env;
use std::net::UdpSocket;
use std::thread;
use std::time::{Duration, Instant};

struct SenderArgs {
    serial_port: String,
    baud: u32,
    dest: String,
    hz: f64,
}

/// Parse `--serial-port <dev> --dest <addr> [--baud N] [--hz N]`
fn parse_args() -> Result<SenderArgs> {
    let args: Vec<String> = env::args().collect();
    let mut serial_port = String::new();
    let mut baud = 115_200u32;
    let mut dest = String::new();
    let mut hz = 50.0f64;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--serial-port" if i + 1 < args.len() => {
                serial_port = args[i + 1].clone();
                i += 2;
            }
            "--baud" if i + 1 < args.len() => {
                baud = args[i + 1]
                    .parse()
                    .map_err(|_| Error::Other(format!("invalid baud: {}", args[i + 1])))?;
                i += 2;
            }
            "--dest" if i + 1 < args.len() => {
                dest = args[i + 1].clone();
                i += 2;
            }
            "--hz" if i + 1 < args.len() => {
                hz = args[i + 1]
                    .parse()
                    .map_err(|_| Error::Other(format!("invalid rate: {}", args[i + 1])))?;
                i += 2;
            }
            other => {
                return Err(Error::Other(format!("unknown argument: {}", other)));
            }
        }
    }

    if serial_port.is_empty() || dest.is_empty() {
        return Err(Error::Other(
            "usage: setu-sender --serial-port <dev> --dest <host:port> [--baud N] [--hz N]"
                .to_string(),
        ));
    }

    Ok(SenderArgs {
        serial_port,
        baud,
        dest,
        hz,
    })
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    let interval = Duration::from_secs_f64(1.0 / args.hz.max(1.0));

    log::info!(
        "RC uplink: {} @ {} -> {} at {:.1} Hz",
        args.serial_port,
        args.baud,
        args.dest,
        args.hz
    );

    let mut next_send = Instant::now();
    let mut sent: u64 = 0;

    // Outer loop reopens the serial port after device faults
    loop {
        let mut port = match SerialTransport::open(&args.serial_port, args.baud) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Serial error: {}. Reconnecting in 2 s...", e);
                thread::sleep(Duration::from_secs(2));
                continue;
            }
        };

        let mut scanner = FrameScanner::new();
        loop {
            let candidate = match scanner.poll(&mut port) {
                Ok(Some(c)) => c,
                Ok(None) => continue, // timeout or partial frame
                Err(e) => {
                    log::warn!("Serial read failed: {}. Reopening port...", e);
                    break;
                }
            };

            // Drop candidates that fail header/checksum validation
            let Some(frame) = ControlFrame::decode(&candidate) else {
                continue;
            };

            let now = Instant::now();
            if now < next_send {
                continue; // rate limit, keep draining the stream
            }

            if let Err(e) = socket.send_to(&candidate, &args.dest) {
                log::warn!("UDP send failed: {}", e);
                continue;
            }
            next_send = now + interval;

            sent += 1;
            if sent % 10 == 0 {
                log::debug!("TX #{}: channels {:?}", sent, frame.channels);
            }
        }

        thread::sleep(Duration::from_secs(2));
    }
}
