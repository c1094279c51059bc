//! Error types for the energy monitor

use thiserror::Error;

/// Main error type of the energy monitor
#[derive(Error, Debug)]
pub enum EnermonError {
    /// Invalid setup, reported once at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transient failure reading the ADC
    #[error("Failed to read pin {pin}: {reason}")]
    SampleRead { pin: i32, reason: String },

    /// Non-positive calibration found while sampling
    #[error("Channel {channel} has an unusable calibration: {value}")]
    Calibration { channel: usize, value: f64 },

    /// No calibration in the search range reached the target
    #[error("No calibration between {start} and {stop} reaches {target}")]
    CalibrationNotFound { start: f64, stop: f64, target: f64 },

    /// Malformed sample capture
    #[error("Invalid capture: {0}")]
    Capture(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias for energy monitor operations
pub type Result<T> = std::result::Result<T, EnermonError>;
