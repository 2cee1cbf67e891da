//! Error types for board transport operations.
//!
//! These errors describe what went wrong on the bus. At the [`BoardLink`]
//! boundary they collapse into [`dispenser_core::Error::TransmitFailed`],
//! because the caller can only abort or ask for a retry either way.
//!
//! [`BoardLink`]: crate::link::BoardLink

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while talking to the board.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// The bus rejected or failed a transfer (NACK, arbitration loss, ...).
    #[error("Bus error: {message}")]
    Bus { message: String },

    /// The ready line could not be read.
    #[error("Ready line error: {message}")]
    ReadyLine { message: String },

    /// The board is not attached or stopped responding.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// The board side could not interpret a frame.
    #[error("Invalid frame: {message}")]
    InvalidFrame { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new bus error.
    pub fn bus(message: impl Into<String>) -> Self {
        Self::Bus {
            message: message.into(),
        }
    }

    /// Create a new ready line error.
    pub fn ready_line(message: impl Into<String>) -> Self {
        Self::ReadyLine {
            message: message.into(),
        }
    }

    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new invalid frame error.
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }
}

impl From<HardwareError> for dispenser_core::Error {
    fn from(error: HardwareError) -> Self {
        dispenser_core::Error::transmit_failed(error.to_string())
    }
}
