//! Error types for setu-relay

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// setu-relay error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file error
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Invalid or corrupt frame
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
