//! Configuration for the setu-relay daemon
//!
//! Loads configuration from a TOML file with the minimal parameters the
//! relay needs; defaults match the reference deployment on the Pi.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub uart: UartConfig,
    pub camera: CameraConfig,
    pub gpio: GpioConfig,
    pub logging: LoggingConfig,
}

/// UDP listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Bind address for the iBUS frame receiver, e.g. `0.0.0.0:5000`
    pub listen_address: String,
}

/// Serial link to the vehicle controller
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UartConfig {
    /// Serial device path (e.g. `/dev/serial0`)
    pub port: String,
    /// Baud rate
    pub baud: u32,
}

/// MJPEG encoder pipeline parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CameraConfig {
    pub enabled: bool,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
}

/// Digital output driver selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GpioConfig {
    /// `"sysfs"` for the real pin driver, `"simulated"` otherwise
    pub mode: String,
    /// BCM pin number for the shared digital output
    pub output_pin: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Defaults matching the reference rover deployment
    pub fn rover_defaults() -> Self {
        Self {
            network: NetworkConfig {
                listen_address: "0.0.0.0:5000".to_string(),
            },
            uart: UartConfig {
                port: "/dev/serial0".to_string(),
                baud: 115_200,
            },
            camera: CameraConfig {
                enabled: true,
                width: 960,
                height: 720,
                framerate: 30,
            },
            gpio: GpioConfig {
                mode: "simulated".to_string(),
                output_pin: 17,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::rover_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::rover_defaults();
        assert_eq!(config.network.listen_address, "0.0.0.0:5000");
        assert_eq!(config.uart.port, "/dev/serial0");
        assert_eq!(config.uart.baud, 115_200);
        assert!(config.camera.enabled);
        assert_eq!(config.gpio.mode, "simulated");
    }

    #[test]
    fn test_toml_round_trip() {
        let config = AppConfig::rover_defaults();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[network]"));
        assert!(toml_string.contains("[uart]"));
        assert!(toml_string.contains("[camera]"));
        assert!(toml_string.contains("[gpio]"));
        assert!(toml_string.contains("[logging]"));

        let parsed: AppConfig = toml::from_str(&toml_string).unwrap();
        assert_eq!(parsed.uart.port, config.uart.port);
        assert_eq!(parsed.camera.framerate, config.camera.framerate);
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[network]
listen_address = "127.0.0.1:6000"

[uart]
port = "/dev/ttyUSB0"
baud = 57600

[camera]
enabled = false
width = 640
height = 480
framerate = 20

[gpio]
mode = "sysfs"
output_pin = 27

[logging]
level = "debug"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.network.listen_address, "127.0.0.1:6000");
        assert_eq!(config.uart.baud, 57_600);
        assert!(!config.camera.enabled);
        assert_eq!(config.gpio.mode, "sysfs");
        assert_eq!(config.gpio.output_pin, 27);
        assert_eq!(config.logging.level, "debug");
    }
}
