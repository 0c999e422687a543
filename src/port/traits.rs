//! Core traits for the transport layer.
//!
//! Defines the `TransportPort` byte-stream abstraction and the `SerialBackend`
//! enumeration/open seam, allowing real serial hardware and mock
//! implementations to be used interchangeably.

use super::error::PortError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Line parameters applied to a port right after opening it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineParameters {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits per character.
    pub data_bits: DataBits,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Parity checking mode.
    pub parity: Parity,

    /// Read timeout; reads returning within this window with no data surface
    /// a transient timeout error, not a transport failure.
    pub read_timeout: Duration,
}

impl LineParameters {
    /// Fixed 8N1 framing at the given baud rate, the framing every supported
    /// device speaks.
    pub fn eight_n_one(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            data_bits: DataBits::Eight,
            stop_bits: StopBits::One,
            parity: Parity::None,
            read_timeout: Duration::from_millis(100),
        }
    }
}

impl Default for LineParameters {
    fn default() -> Self {
        Self::eight_n_one(115_200)
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Identity of an attached device as reported by enumeration.
///
/// Opaque to the pipeline; the connection manager holds at most one as the
/// current selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// System path of the port (e.g. "/dev/ttyUSB0" or "COM3").
    pub port_name: String,
    /// USB vendor id, when the port is USB-attached.
    pub vendor_id: Option<u16>,
    /// USB product id, when the port is USB-attached.
    pub product_id: Option<u16>,
    /// Product string reported by the device, if any.
    pub product: Option<String>,
}

impl DeviceDescriptor {
    /// Descriptor for a bare port path with no USB identity.
    pub fn from_port_name(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            vendor_id: None,
            product_id: None,
            product: None,
        }
    }

    /// Human-readable label for device pickers.
    pub fn label(&self) -> String {
        match (self.vendor_id, self.product_id) {
            (Some(vid), Some(pid)) => {
                format!("{} VID={:04x} PID={:04x}", self.port_name, vid, pid)
            }
            _ => self.port_name.clone(),
        }
    }
}

/// Trait for transport port I/O operations.
///
/// Abstracts over an open byte-stream endpoint so both real serial ports and
/// mocks can feed the pipeline. Ports are handed out already open by
/// [`SerialBackend::open`]; `close` is terminal and every later operation
/// reports `PortError::NotOpen`.
pub trait TransportPort: Send + std::fmt::Debug {
    /// Write bytes to the port. Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes from the port into the provided buffer.
    ///
    /// Returns the number of bytes actually read. An elapsed read timeout
    /// surfaces as a transient error (see [`PortError::is_transient`]), never
    /// as `Ok(0)` with meaning attached.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Apply baud rate, framing and read timeout.
    fn set_line_parameters(&mut self, params: &LineParameters) -> Result<(), PortError>;

    /// Drive the DTR and RTS control lines. Used to pulse-reset an attached
    /// microcontroller during connection establishment.
    fn set_control_lines(&mut self, dtr: bool, rts: bool) -> Result<(), PortError>;

    /// Get the name/path of this port.
    fn name(&self) -> &str;

    /// Close the port and release the underlying handle.
    fn close(&mut self) -> Result<(), PortError>;
}

/// Device enumeration and port opening seam.
///
/// The system implementation sits on the `serialport` crate; tests inject a
/// mock. `request_permission` exists because some platforms gate raw device
/// access behind an asynchronous grant dialog; on desktop it degenerates to
/// re-checking filesystem access.
#[async_trait]
pub trait SerialBackend: Send + Sync {
    /// Enumerate currently attached devices, in platform order.
    fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, PortError>;

    /// Whether the process may open the device right now.
    fn has_permission(&self, device: &DeviceDescriptor) -> bool;

    /// Ask the platform for access to the device. Resolves to the grant/deny
    /// outcome; `Ok(false)` is a denial, not an error.
    async fn request_permission(&self, device: &DeviceDescriptor) -> Result<bool, PortError>;

    /// Open the device and return the live transport port.
    fn open(&self, device: &DeviceDescriptor) -> Result<Box<dyn TransportPort>, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_framing() {
        let params = LineParameters::eight_n_one(921_600);
        assert_eq!(params.baud_rate, 921_600);
        assert_eq!(params.data_bits, DataBits::Eight);
        assert_eq!(params.stop_bits, StopBits::One);
        assert_eq!(params.parity, Parity::None);
    }

    #[test]
    fn test_serialport_conversions() {
        let bits: serialport::DataBits = DataBits::Eight.into();
        assert_eq!(bits, serialport::DataBits::Eight);
        let stop: serialport::StopBits = StopBits::One.into();
        assert_eq!(stop, serialport::StopBits::One);
        let parity: serialport::Parity = Parity::None.into();
        assert_eq!(parity, serialport::Parity::None);
    }

    #[test]
    fn test_descriptor_label() {
        let usb = DeviceDescriptor {
            port_name: "/dev/ttyUSB0".into(),
            vendor_id: Some(0x303a),
            product_id: Some(0x1001),
            product: Some("ESP32-S3".into()),
        };
        assert_eq!(usb.label(), "/dev/ttyUSB0 VID=303a PID=1001");

        let bare = DeviceDescriptor::from_port_name("COM3");
        assert_eq!(bare.label(), "COM3");
    }
}
