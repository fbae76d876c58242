//! Error types and handling for the GSM panic controller
//!
//! This module defines the error types used throughout the application.
//! Errors are split into transport I/O failures (serial line, UDP socket),
//! which feed the error-rate counters and the USB recovery policy, and
//! everything else, which is treated as a generic runtime failure.

use thiserror::Error;

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, GsmPanicError>;

/// Main error type for the controller
#[derive(Debug, Error)]
pub enum GsmPanicError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Serial line / modem communication errors
    #[error("Serial error: {message}")]
    Serial { message: String },

    /// UDP datagram errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File and device I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// External process errors (USB power-cycle helpers)
    #[error("Process error: {message}")]
    Process { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl GsmPanicError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new serial error
    pub fn serial<S: Into<String>>(message: S) -> Self {
        Self::Serial {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a new process error
    pub fn process<S: Into<String>>(message: S) -> Self {
        Self::Process {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Whether this error came from the transport layer (device or socket I/O).
    ///
    /// Transport errors are counted per transport, logged with rate-limited
    /// severity and, for the serial line, drive the USB power-cycle policy.
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Serial { .. } | Self::Network { .. } | Self::Io { .. } | Self::Timeout { .. }
        )
    }
}

impl From<std::io::Error> for GsmPanicError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for GsmPanicError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GsmPanicError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serialport::Error> for GsmPanicError {
    fn from(err: serialport::Error) -> Self {
        Self::serial(err.to_string())
    }
}
