//! Transport layer for serial communication.
//!
//! Provides the byte-stream and enumeration traits the pipeline depends on,
//! the system implementation on the `serialport` crate, and mocks for
//! hardware-free testing.

pub mod error;
pub mod mock;
pub mod serial;
pub mod traits;

pub use error::PortError;
pub use mock::{MockBackend, MockTransportPort};
pub use serial::{SystemBackend, SystemSerialPort};
pub use traits::*;
