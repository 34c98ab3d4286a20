//! Error types for the control side
use thiserror::Error;

/// Control errors
#[derive(Error, Debug)]
pub enum ControlError {
    /// Generic sensor link error
    #[error("Serial error: {0}")]
    SerialError(String),

    /// Serial port open/configure error
    #[error("Serial port error: {0}")]
    #[cfg(feature = "serial")]
    SerialPortError(#[from] serialport::Error),

    /// OSC error
    #[error("OSC error: {0}")]
    OscError(String),

    /// LED output error
    #[error("LED error: {0}")]
    LedError(String),

    /// Effect computation failed for one frame
    #[error("Effect error: {0}")]
    EffectError(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Invalid message format
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Value type differs from the type registered for an address
    #[error("Type mismatch on {address}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// OSC address
        address: String,
        /// Registered value kind
        expected: &'static str,
        /// Rejected value kind
        actual: &'static str,
    },
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;
