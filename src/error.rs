//! # Error Types
//!
//! Custom error types for RCIO Bridge using `thiserror`.

use thiserror::Error;

use crate::protocol::registers::RegisterAddress;

/// Main error type for RCIO Bridge
#[derive(Debug, Error)]
pub enum RcioError {
    /// Request rejected before touching the bus (e.g. too many registers)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying SPI exchange failed
    #[error("Transport error: {0}")]
    Transport(#[source] std::io::Error),

    /// Received frame failed checksum validation
    #[error("Checksum mismatch: computed 0x{expected:02X}, received 0x{received:02X}")]
    Integrity { expected: u8, received: u8 },

    /// Peripheral answered with the ERROR opcode
    #[error("Request rejected by device at register {address}")]
    DeviceRejected { address: RegisterAddress },

    /// Peripheral returned a different number of registers than requested
    #[error("Register count mismatch: requested {expected}, received {received}")]
    CountMismatch { expected: usize, received: usize },

    /// No RC input is currently available
    #[error("RC input not connected")]
    NotConnected,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`RcioError`]
///
/// Mirrors the errno classes the peripheral protocol reports through:
/// requests the device will never accept, bus or data failures, and the
/// expected "no receiver" state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    InvalidArgument,
    Io,
    NotConnected,
}

impl RcioError {
    /// Class of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            RcioError::InvalidArgument(_) | RcioError::DeviceRejected { .. } => {
                ErrorClass::InvalidArgument
            }
            RcioError::NotConnected => ErrorClass::NotConnected,
            RcioError::Config(_) => ErrorClass::InvalidArgument,
            RcioError::Transport(_)
            | RcioError::Integrity { .. }
            | RcioError::CountMismatch { .. }
            | RcioError::Io(_) => ErrorClass::Io,
        }
    }

    /// Whether resubmitting the same request on a later cycle may succeed
    ///
    /// The device rejecting a request or answering with the wrong register
    /// count will not change by resending it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RcioError::Transport(_) | RcioError::Integrity { .. } | RcioError::Io(_)
        )
    }
}

/// Result type alias for RCIO Bridge
pub type Result<T> = std::result::Result<T, RcioError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_device_rejected_is_invalid_argument_class() {
        let err = RcioError::DeviceRejected {
            address: RegisterAddress::new(1, 2),
        };
        assert_eq!(err.to_string(), "Request rejected by device at register 1:2");
        assert_eq!(err.class(), ErrorClass::InvalidArgument);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_integrity_and_count_mismatch_are_io_class() {
        let integrity = RcioError::Integrity { expected: 0x12, received: 0x34 };
        let count = RcioError::CountMismatch { expected: 16, received: 2 };

        assert_eq!(integrity.class(), ErrorClass::Io);
        assert_eq!(count.class(), ErrorClass::Io);
        assert!(integrity.is_retryable());
        assert!(!count.is_retryable());
    }

    #[test]
    fn test_transport_error_message() {
        let err = RcioError::Transport(io::Error::new(io::ErrorKind::TimedOut, "bus stuck"));
        assert_eq!(err.class(), ErrorClass::Io);
        assert!(err.to_string().contains("bus stuck"));
    }

    #[test]
    fn test_not_connected_class() {
        assert_eq!(RcioError::NotConnected.class(), ErrorClass::NotConnected);
    }
}
