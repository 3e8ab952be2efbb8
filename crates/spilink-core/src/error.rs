//! Error types for SPI session operations

use std::fmt;
use thiserror::Error;

/// Scalar setting pushed to the driver when a device is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    /// Packed mode byte (clock mode, chip select, bit order, flags)
    Mode,
    /// Bits per word
    BitsPerWord,
    /// Maximum clock speed in Hz
    MaxSpeedHz,
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mode => write!(f, "mode"),
            Self::BitsPerWord => write!(f, "bits per word"),
            Self::MaxSpeedHz => write!(f, "max speed"),
        }
    }
}

/// SPI session errors
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range configuration value or buffer pair
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation attempted in the wrong lifecycle state
    #[error("Illegal state: {0}")]
    IllegalState(&'static str),

    /// Driver could not acquire the device handle
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A configuration push was refused by the driver
    #[error("Failed to set {setting}: {source}")]
    ConfigurationRejected {
        setting: Setting,
        #[source]
        source: std::io::Error,
    },

    /// The atomic exchange failed at the driver level
    #[error("SPI transfer failed: {0}")]
    TransferFailed(#[source] std::io::Error),
}

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Result type for SPI session operations
pub type Result<T> = std::result::Result<T, Error>;
