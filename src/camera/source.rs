//! Byte stream sources for the camera feed
//!
//! The feed only assumes a readable byte stream that returns zero bytes
//! at end-of-stream; chunk boundaries and timing are unspecified.

use crate::config::CameraConfig;
use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};

/// Readable byte stream capability
pub trait ByteSource: Send {
    /// Read a chunk; `Ok(0)` means end-of-stream
    fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;
}

/// Byte source backed by an external MJPEG encoder process
///
/// Spawns `rpicam-vid` writing MJPEG to stdout. The child is killed and
/// reaped on drop so a restarting feed never leaks processes.
pub struct ProcessByteSource {
    child: Child,
    stdout: ChildStdout,
}

impl ProcessByteSource {
    pub fn spawn(config: &CameraConfig) -> std::io::Result<Self> {
        let mut child = Command::new("rpicam-vid")
            .args([
                "--codec",
                "mjpeg",
                // Full-sensor binned mode for maximum field of view
                "--mode",
                "4",
                "--width",
                &config.width.to_string(),
                "--height",
                &config.height.to_string(),
                "--framerate",
                &config.framerate.to_string(),
                "--timeout",
                "0",
                "--nopreview",
                "--output",
                "-",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "encoder stdout not captured")
        })?;

        Ok(Self { child, stdout })
    }
}

impl ByteSource for ProcessByteSource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stdout.read(buf)
    }
}

impl Drop for ProcessByteSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
