//! System transport implementation on the `serialport` crate.
//!
//! `SystemSerialPort` wraps `serialport::SerialPort` behind our
//! [`TransportPort`] trait; `SystemBackend` provides enumeration and opening
//! for real hardware.

use super::error::PortError;
use super::traits::{
    DeviceDescriptor, LineParameters, SerialBackend, TransportPort,
};
use async_trait::async_trait;
use std::io::{Read, Write};

/// Transport port backed by a real serial device.
pub struct SystemSerialPort {
    /// The underlying handle; `None` once the port has been closed.
    port: Option<Box<dyn serialport::SerialPort>>,
    /// The port name/path for identification.
    name: String,
}

impl SystemSerialPort {
    /// Open a serial device with default 8N1 line parameters.
    ///
    /// The caller normally reapplies parameters through
    /// [`TransportPort::set_line_parameters`] with the operator's baud rate.
    pub fn open(port_name: &str) -> Result<Self, PortError> {
        let params = LineParameters::default();
        let port = serialport::new(port_name, params.baud_rate)
            .data_bits(params.data_bits.into())
            .stop_bits(params.stop_bits.into())
            .parity(params.parity.into())
            .flow_control(serialport::FlowControl::None)
            .timeout(params.read_timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::not_found(port_name),
                serialport::ErrorKind::Io(std::io::ErrorKind::NotFound) => {
                    PortError::not_found(port_name)
                }
                serialport::ErrorKind::InvalidInput => {
                    PortError::invalid_parameters(e.to_string())
                }
                _ => PortError::Serial(e),
            })?;

        Ok(Self {
            port: Some(port),
            name: port_name.to_string(),
        })
    }

    fn handle(&mut self) -> Result<&mut Box<dyn serialport::SerialPort>, PortError> {
        self.port.as_mut().ok_or(PortError::NotOpen)
    }
}

impl TransportPort for SystemSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.handle()?.write(data).map_err(PortError::Io)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.handle()?.read(buffer).map_err(PortError::Io)
    }

    fn set_line_parameters(&mut self, params: &LineParameters) -> Result<(), PortError> {
        let port = self.handle()?;
        port.set_baud_rate(params.baud_rate)?;
        port.set_data_bits(params.data_bits.into())?;
        port.set_stop_bits(params.stop_bits.into())?;
        port.set_parity(params.parity.into())?;
        port.set_timeout(params.read_timeout)?;
        Ok(())
    }

    fn set_control_lines(&mut self, dtr: bool, rts: bool) -> Result<(), PortError> {
        let port = self.handle()?;
        port.write_data_terminal_ready(dtr)?;
        port.write_request_to_send(rts)?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> Result<(), PortError> {
        // Dropping the handle releases the OS file descriptor.
        match self.port.take() {
            Some(port) => {
                drop(port);
                Ok(())
            }
            None => Err(PortError::NotOpen),
        }
    }
}

impl std::fmt::Debug for SystemSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemSerialPort")
            .field("name", &self.name)
            .field("open", &self.port.is_some())
            .finish()
    }
}

/// Enumeration and opening backed by the host OS.
#[derive(Debug, Default, Clone)]
pub struct SystemBackend;

impl SystemBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SerialBackend for SystemBackend {
    fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, PortError> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|info| match info.port_type {
                serialport::SerialPortType::UsbPort(usb) => DeviceDescriptor {
                    port_name: info.port_name,
                    vendor_id: Some(usb.vid),
                    product_id: Some(usb.pid),
                    product: usb.product,
                },
                _ => DeviceDescriptor::from_port_name(info.port_name),
            })
            .collect())
    }

    fn has_permission(&self, device: &DeviceDescriptor) -> bool {
        device_accessible(&device.port_name)
    }

    async fn request_permission(&self, device: &DeviceDescriptor) -> Result<bool, PortError> {
        // Desktop platforms have no grant dialog; access is governed by file
        // permissions (e.g. dialout group membership), so a request is just a
        // re-check. A denial maps to PermissionDenied at the manager level.
        Ok(self.has_permission(device))
    }

    fn open(&self, device: &DeviceDescriptor) -> Result<Box<dyn TransportPort>, PortError> {
        Ok(Box::new(SystemSerialPort::open(&device.port_name)?))
    }
}

#[cfg(unix)]
fn device_accessible(port_name: &str) -> bool {
    use std::ffi::CString;
    let Ok(path) = CString::new(port_name) else {
        return false;
    };
    // SAFETY: path is a valid NUL-terminated C string for the call duration.
    unsafe { libc::access(path.as_ptr(), libc::R_OK | libc::W_OK) == 0 }
}

#[cfg(not(unix))]
fn device_accessible(_port_name: &str) -> bool {
    // Windows has no pre-open access probe; open itself reports the failure.
    true
}
