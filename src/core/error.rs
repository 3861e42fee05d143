use std::io;
use std::time::Duration;
use thiserror::Error;

/// Custom error types for the WWVB time server
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Receiver not responding (device id 0x{device_id:02X})")]
    HardwareNotResponding {
        /// Value read from the identification register
        device_id: u8,
    },

    #[error("Receiver not initialized")]
    NotInitialized,

    #[error("Receiver not powered")]
    NotPowered,

    #[error("Reception not confirmed (status 0x{status:02X})")]
    ReceptionNotConfirmed {
        /// Raw status register value
        status: u8,
    },

    #[error("Bus timeout during {operation} after {elapsed:?}")]
    BusTimeout {
        /// Transaction that overran
        operation: &'static str,
        /// Time the transaction actually took
        elapsed: Duration,
    },

    #[error("Bus error: {0}")]
    Bus(String),

    #[error("Acquisition timed out after {elapsed:?}")]
    AcquisitionTimeout {
        /// Time spent waiting for a decoded frame
        elapsed: Duration,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new bus error from a HAL error
    pub fn bus(err: impl std::fmt::Debug) -> Self {
        Error::Bus(format!("{:?}", err))
    }

    /// Creates a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Returns true for failures of the receiver hardware or its bus
    pub fn is_hardware(&self) -> bool {
        matches!(
            self,
            Error::HardwareNotResponding { .. }
                | Error::NotPowered
                | Error::BusTimeout { .. }
                | Error::Bus(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("bad offset");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: bad offset");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_hardware_errors() {
        let err = Error::HardwareNotResponding { device_id: 0xFF };
        assert_eq!(err.to_string(), "Receiver not responding (device id 0xFF)");
        assert!(err.is_hardware());
        assert!(Error::bus("nack").is_hardware());
        assert!(!Error::ReceptionNotConfirmed { status: 0 }.is_hardware());
    }
}
