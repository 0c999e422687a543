//! Transport-level error types.
//!
//! Errors raised by the transport port and device enumeration layer, kept
//! separate from application-level errors so the connection manager can decide
//! how each failure maps onto its state machine.

use thiserror::Error;

/// Errors that can occur on a transport port or during device enumeration.
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested device/port does not exist on the system.
    #[error("Serial device not found: {0}")]
    NotFound(String),

    /// An I/O error occurred while talking to the port.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line parameters were rejected by the driver.
    #[error("Invalid line parameters: {0}")]
    InvalidParameters(String),

    /// Operation timed out.
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Operation attempted on a port that has already been closed.
    #[error("Port is not open")]
    NotOpen,

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create an InvalidParameters error from a message.
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }

    /// Create a Timeout error from a duration.
    pub fn timeout(duration: std::time::Duration) -> Self {
        Self::Timeout(duration)
    }

    /// True when the error only means "no bytes arrived within the read
    /// timeout" rather than a real transport failure. The reader loop polls
    /// again on these instead of tearing the connection down.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortError::not_found("/dev/ttyUSB0");
        assert_eq!(err.to_string(), "Serial device not found: /dev/ttyUSB0");

        let err = PortError::invalid_parameters("baud rate 0");
        assert_eq!(err.to_string(), "Invalid line parameters: baud rate 0");

        let err = PortError::NotOpen;
        assert_eq!(err.to_string(), "Port is not open");
    }

    #[test]
    fn test_transient_classification() {
        assert!(PortError::timeout(std::time::Duration::from_millis(100)).is_transient());
        assert!(PortError::Io(std::io::Error::new(
            std::io::ErrorKind::WouldBlock,
            "no data"
        ))
        .is_transient());
        assert!(!PortError::NotOpen.is_transient());
        assert!(!PortError::Io(std::io::Error::other("device gone")).is_transient());
    }
}
