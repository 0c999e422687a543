//! Unified application error type.
//!
//! Everything here is recoverable by the operator re-issuing a select/open
//! action; the connection manager additionally mirrors each failure into its
//! `Failed` state plus a status notification, so transport errors never
//! escape to callers raw.

use crate::port::PortError;
use thiserror::Error;

/// A specialized `Result` for monitor operations.
pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// The platform refused access to the selected device.
    #[error("Permission to access the device was denied")]
    PermissionDenied,

    /// No usable serial device is attached.
    #[error("No serial device available: {0}")]
    DeviceUnavailable(String),

    /// Opening or configuring the transport failed.
    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    /// The delivery path reported a failure mid-stream.
    #[error("I/O error on live connection: {0}")]
    IoError(String),

    /// An operation required a selected device, but none is chosen.
    #[error("No device selected")]
    NoSelection,
}

impl AppError {
    /// Map a transport error raised during open/configure.
    pub fn open_failed(err: PortError) -> Self {
        match err {
            PortError::NotFound(name) => Self::DeviceUnavailable(name),
            other => Self::OpenFailed(other.to_string()),
        }
    }
}
