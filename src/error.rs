//! # Error Types
//!
//! Custom error types for the CanSat telemetry stack using `thiserror`.
//!
//! Each subsystem reports its own error kind so the outer loop can decide
//! whether the loss of that subsystem is fatal. Initialization errors are
//! terminal for the affected driver instance only.

use thiserror::Error;

/// Transceiver driver errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    /// Nothing answered on the bus (version register read back as 0x00 or 0xFF)
    #[error("no transceiver answered on the bus")]
    HardwareNotPresent,

    /// A device answered but its silicon revision is not the supported one
    #[error("unexpected transceiver revision 0x{found:02X} (expected 0x{expected:02X})")]
    UnexpectedHardware { found: u8, expected: u8 },

    /// A bus transaction or reset line operation failed
    #[error("radio bus fault: {0}")]
    BusFault(String),

    /// The transmit-complete flag was never observed within the retry budget
    #[error("transmit did not complete after {attempts} polls")]
    Timeout { attempts: u32 },

    /// Payload does not fit in a single FIFO frame
    #[error("payload of {0} bytes exceeds the 255-byte frame limit")]
    PayloadTooLarge(usize),

    /// Radio parameters rejected before touching the hardware
    #[error("invalid radio configuration: {0}")]
    InvalidConfig(String),
}

/// Barometric sensor errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    /// The sensor did not acknowledge its address
    #[error("no sensor answered on the bus")]
    HardwareNotPresent,

    /// The chip id register holds an unsupported value
    #[error("unexpected sensor chip id 0x{found:02X} (expected 0x{expected:02X})")]
    UnexpectedHardware { found: u8, expected: u8 },

    /// A bus transaction failed
    #[error("sensor bus fault: {0}")]
    BusFault(String),
}

/// Main error type for the CanSat telemetry stack
#[derive(Debug, Error)]
pub enum CansatError {
    /// Transceiver errors
    #[error("radio error: {0}")]
    Radio(#[from] RadioError),

    /// Sensor errors
    #[error("sensor error: {0}")]
    Sensor(#[from] SensorError),

    /// Malformed telemetry text
    #[error("telemetry decode failure: {0}")]
    Decode(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Platform peripheral could not be opened
    #[error("hardware error: {0}")]
    Hardware(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for the CanSat telemetry stack
pub type Result<T> = std::result::Result<T, CansatError>;
