//! Application orchestration for the relay daemon
//!
//! Wires together the bridge, output arbiter, and camera feed as
//! independent long-running threads sharing one [`TelemetryState`], and
//! handles graceful shutdown on SIGINT/SIGTERM. No loop blocks another;
//! all cross-loop communication goes through the telemetry aggregate.

use crate::bridge::RelayBridge;
use crate::camera::{CameraFeed, ProcessByteSource};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::gpio::{DigitalOutput, OutputArbiter, SimulatedOutput, SysfsOutput};
use crate::telemetry::{LogSource, TelemetryState};
use crate::transport::SerialTransport;
use log::{error, info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Main application structure that owns the shared state and threads
pub struct RelayApp {
    config: AppConfig,
    state: Arc<TelemetryState>,
    camera: Arc<CameraFeed>,
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl RelayApp {
    pub fn new(config: AppConfig) -> Self {
        let state = Arc::new(TelemetryState::new());
        let camera = Arc::new(CameraFeed::new(Arc::clone(&state)));
        Self {
            config,
            state,
            camera,
            shutdown: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
        }
    }

    /// Shared telemetry aggregate (status/log/command interface for the
    /// dashboard collaborator)
    pub fn telemetry(&self) -> Arc<TelemetryState> {
        Arc::clone(&self.state)
    }

    /// Camera feed handle (latest-frame interface)
    pub fn camera(&self) -> Arc<CameraFeed> {
        Arc::clone(&self.camera)
    }

    /// Start all threads and block until shutdown
    pub fn run(&mut self) -> Result<()> {
        info!("Initializing setu-relay");

        // UDP bind failure is fatal at startup
        let socket = UdpSocket::bind(&self.config.network.listen_address).map_err(|e| {
            Error::Other(format!(
                "Cannot bind UDP {}: {}",
                self.config.network.listen_address, e
            ))
        })?;
        info!("UDP bound to {}", self.config.network.listen_address);
        self.state.add_log(
            LogSource::Pi,
            format!("UDP listening {}", self.config.network.listen_address),
        );

        // Serial open failure is non-fatal: the bridge runs with UDP
        // reception and logging only until a restart
        let uart = match SerialTransport::open(&self.config.uart.port, self.config.uart.baud) {
            Ok(t) => {
                self.state.set_uart_open(true);
                self.state.add_log(
                    LogSource::Pi,
                    format!(
                        "UART open {} @ {}",
                        self.config.uart.port, self.config.uart.baud
                    ),
                );
                Some(t)
            }
            Err(e) => {
                warn!("Cannot open UART {}: {}", self.config.uart.port, e);
                self.state
                    .add_log(LogSource::Pi, format!("UART error: {}", e));
                None
            }
        };

        self.spawn_bridge_thread(socket, uart)?;
        self.spawn_arbiter_thread()?;
        if self.config.camera.enabled {
            self.spawn_camera_thread()?;
        } else {
            info!("Camera feed disabled by config");
        }
        self.setup_signal_handler()?;

        info!("setu-relay running. Press Ctrl+C to stop.");

        while !self.shutdown.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(100));
        }

        info!("Shutting down...");
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        info!("setu-relay stopped");
        Ok(())
    }

    fn spawn_bridge_thread(
        &mut self,
        socket: UdpSocket,
        uart: Option<SerialTransport>,
    ) -> Result<()> {
        let state = Arc::clone(&self.state);
        let shutdown = Arc::clone(&self.shutdown);

        let handle = thread::Builder::new()
            .name("bridge".to_string())
            .spawn(move || {
                let mut bridge = RelayBridge::new(uart, state);
                if let Err(e) = bridge.run(&socket, &shutdown) {
                    error!("Bridge loop error: {}", e);
                }
            })
            .map_err(|e| Error::Other(format!("Failed to spawn bridge thread: {}", e)))?;

        self.handles.push(handle);
        Ok(())
    }

    fn spawn_arbiter_thread(&mut self) -> Result<()> {
        let output = self.open_output_driver();
        let state = Arc::clone(&self.state);
        let shutdown = Arc::clone(&self.shutdown);

        let handle = thread::Builder::new()
            .name("gpio-arbiter".to_string())
            .spawn(move || {
                let mut arbiter = OutputArbiter::new(output, state);
                arbiter.run(&shutdown);
            })
            .map_err(|e| Error::Other(format!("Failed to spawn arbiter thread: {}", e)))?;

        self.handles.push(handle);
        Ok(())
    }

    /// Select the output driver; arbitration logic is identical for both
    fn open_output_driver(&self) -> Box<dyn DigitalOutput> {
        if self.config.gpio.mode == "sysfs" {
            match SysfsOutput::open(self.config.gpio.output_pin) {
                Ok(pin) => return Box::new(pin),
                Err(e) => {
                    warn!(
                        "GPIO {} unavailable ({}), using simulated output",
                        self.config.gpio.output_pin, e
                    );
                    self.state
                        .add_log(LogSource::Gpio, format!("GPIO unavailable: {}", e));
                }
            }
        }
        Box::new(SimulatedOutput::new())
    }

    fn spawn_camera_thread(&mut self) -> Result<()> {
        let camera = Arc::clone(&self.camera);
        let shutdown = Arc::clone(&self.shutdown);
        let camera_config = self.config.camera.clone();

        let handle = thread::Builder::new()
            .name("camera".to_string())
            .spawn(move || {
                camera.run(&shutdown, || {
                    ProcessByteSource::spawn(&camera_config)
                        .map(|s| Box::new(s) as Box<dyn crate::camera::ByteSource>)
                });
            })
            .map_err(|e| Error::Other(format!("Failed to spawn camera thread: {}", e)))?;

        self.handles.push(handle);
        Ok(())
    }

    fn setup_signal_handler(&mut self) -> Result<()> {
        let mut signals = Signals::new([SIGINT, SIGTERM])
            .map_err(|e| Error::Other(format!("Failed to register signal handler: {}", e)))?;
        let shutdown = Arc::clone(&self.shutdown);

        thread::Builder::new()
            .name("signals".to_string())
            .spawn(move || {
                if let Some(sig) = signals.forever().next() {
                    info!("Received signal {}, shutting down", sig);
                    shutdown.store(true, Ordering::Relaxed);
                }
            })
            .map_err(|e| Error::Other(format!("Failed to spawn signal thread: {}", e)))?;

        Ok(())
    }
}
