//! Camera feed: runs the JPEG extractor against an external encoder
//! process and exposes the latest complete frame

mod extractor;
mod source;

pub use extractor::JpegExtractor;
pub use source::{ByteSource, ProcessByteSource};

use crate::telemetry::{LogSource, TelemetryState};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Delay before restarting a dead encoder pipeline
const RESTART_DELAY: Duration = Duration::from_secs(2);

/// Read chunk size from the encoder stream
const CHUNK_SIZE: usize = 8192;

/// Holds the most recent complete JPEG frame from the encoder stream
///
/// The frame is swapped atomically behind a mutex; readers get an `Arc`
/// to the frame as of the read instant, so a concurrent swap can never
/// tear the bytes they are looking at.
pub struct CameraFeed {
    state: Arc<TelemetryState>,
    latest: Mutex<Option<Arc<Vec<u8>>>>,
}

impl CameraFeed {
    pub fn new(state: Arc<TelemetryState>) -> Self {
        Self {
            state,
            latest: Mutex::new(None),
        }
    }

    /// Latest complete frame, if any has been extracted yet
    pub fn latest_jpeg(&self) -> Option<Arc<Vec<u8>>> {
        self.latest.lock().clone()
    }

    /// Run the feed loop until shutdown, reopening the source whenever it
    /// ends or fails
    pub fn run<F>(&self, shutdown: &AtomicBool, mut open_source: F)
    where
        F: FnMut() -> std::io::Result<Box<dyn ByteSource>>,
    {
        while !shutdown.load(Ordering::Relaxed) {
            let mut source = match open_source() {
                Ok(s) => {
                    self.state.set_camera_ok(true);
                    self.state
                        .add_log(LogSource::Cam, "video pipeline started");
                    s
                }
                Err(e) => {
                    self.state.set_camera_ok(false);
                    self.state
                        .add_log(LogSource::Cam, format!("failed to start camera: {}", e));
                    interruptible_sleep(shutdown, RESTART_DELAY);
                    continue;
                }
            };

            self.pump_source(source.as_mut(), shutdown);
            interruptible_sleep(shutdown, RESTART_DELAY);
        }
    }

    /// Drain one source until end-of-stream, error, or shutdown
    fn pump_source(&self, source: &mut dyn ByteSource, shutdown: &AtomicBool) {
        let mut extractor = JpegExtractor::new();
        let mut chunk = [0u8; CHUNK_SIZE];

        while !shutdown.load(Ordering::Relaxed) {
            match source.read_chunk(&mut chunk) {
                Ok(0) => {
                    self.state.set_camera_ok(false);
                    self.state
                        .add_log(LogSource::Cam, "video pipeline ended, restarting");
                    return;
                }
                Ok(n) => {
                    if let Some(frame) = extractor.push(&chunk[..n]) {
                        *self.latest.lock() = Some(Arc::new(frame));
                        self.state.set_camera_ok(true);
                    }
                }
                Err(e) => {
                    self.state.set_camera_ok(false);
                    log::warn!("Camera read error: {}", e);
                    return;
                }
            }
        }
    }
}

fn interruptible_sleep(shutdown: &AtomicBool, total: Duration) {
    let step = Duration::from_millis(100);
    let mut remaining = total;
    while !shutdown.load(Ordering::Relaxed) && remaining > Duration::ZERO {
        let slice = remaining.min(step);
        std::thread::sleep(slice);
        remaining = remaining.saturating_sub(slice);
    }
}
