//! Mock transport implementation for testing.
//!
//! `MockTransportPort` simulates a serial-attached device without hardware:
//! tests script inbound byte chunks, inspect writes and control-line pulses,
//! and inject mid-stream read failures. `MockBackend` pairs it with a scripted
//! enumeration layer and a shared operation log so lifecycle ordering (close
//! before reopen, exactly one reader) can be asserted.

use super::error::PortError;
use super::traits::{DeviceDescriptor, LineParameters, SerialBackend, TransportPort};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Shared, ordered log of backend/port operations, for ordering assertions.
pub type OpLog = Arc<Mutex<Vec<String>>>;

/// Inner state of the mock port, protected by a mutex for interior mutability.
#[derive(Debug, Default)]
struct MockPortState {
    /// Chunks returned by subsequent reads, preserving delivery boundaries.
    read_queue: VecDeque<Vec<u8>>,
    /// All bytes written to the port.
    write_log: Vec<Vec<u8>>,
    /// Every `set_control_lines` call, in order.
    control_line_log: Vec<(bool, bool)>,
    /// Most recently applied line parameters.
    line_parameters: Option<LineParameters>,
    /// Error message delivered on the next read, simulating a transport fault.
    fail_next_read: Option<String>,
    closed: bool,
}

/// Mock transport port. Cloning yields another handle onto the same state, so
/// a test can keep feeding chunks after the connection manager has taken
/// ownership of the boxed port.
#[derive(Clone)]
pub struct MockTransportPort {
    name: String,
    state: Arc<Mutex<MockPortState>>,
    ops: Option<OpLog>,
}

impl MockTransportPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState::default())),
            ops: None,
        }
    }

    fn with_ops(name: impl Into<String>, ops: OpLog) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState::default())),
            ops: Some(ops),
        }
    }

    fn record(&self, op: &str) {
        if let Some(ops) = &self.ops {
            ops.lock().push(format!("{} {}", op, self.name));
        }
    }

    /// Queue one inbound delivery. Each call is handed to exactly one read so
    /// chunk boundaries survive into the reassembler.
    pub fn push_chunk(&self, data: &[u8]) {
        self.state.lock().read_queue.push_back(data.to_vec());
    }

    /// Make the next read fail with the given message.
    pub fn inject_read_error(&self, message: impl Into<String>) {
        self.state.lock().fail_next_read = Some(message.into());
    }

    /// All data written to the port so far.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// Every control-line transition applied, in order.
    pub fn control_line_log(&self) -> Vec<(bool, bool)> {
        self.state.lock().control_line_log.clone()
    }

    /// The line parameters most recently applied, if any.
    pub fn line_parameters(&self) -> Option<LineParameters> {
        self.state.lock().line_parameters.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl TransportPort for MockTransportPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PortError::NotOpen);
        }
        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PortError::NotOpen);
        }
        if let Some(message) = state.fail_next_read.take() {
            return Err(PortError::Io(std::io::Error::other(message)));
        }
        match state.read_queue.pop_front() {
            Some(mut chunk) => {
                let n = chunk.len().min(buffer.len());
                buffer[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    // Undersized caller buffer; requeue the tail.
                    chunk.drain(..n);
                    state.read_queue.push_front(chunk);
                }
                Ok(n)
            }
            None => Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "no data available",
            ))),
        }
    }

    fn set_line_parameters(&mut self, params: &LineParameters) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PortError::NotOpen);
        }
        state.line_parameters = Some(params.clone());
        Ok(())
    }

    fn set_control_lines(&mut self, dtr: bool, rts: bool) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PortError::NotOpen);
        }
        state.control_line_log.push((dtr, rts));
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(PortError::NotOpen);
        }
        state.closed = true;
        drop(state);
        self.record("close");
        Ok(())
    }
}

impl std::fmt::Debug for MockTransportPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransportPort")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Scripted enumeration/open backend for tests.
#[derive(Default)]
pub struct MockBackend {
    devices: Mutex<Vec<DeviceDescriptor>>,
    /// Live port handles by port name, so tests can drive a port the manager
    /// currently owns.
    ports: Mutex<HashMap<String, MockTransportPort>>,
    /// Devices the process has no access grant for.
    denied: Mutex<Vec<String>>,
    /// Whether a permission request for a denied device succeeds.
    grant_on_request: Mutex<bool>,
    /// Devices whose open attempt should fail.
    fail_open: Mutex<Vec<String>>,
    ops: OpLog,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            grant_on_request: Mutex::new(true),
            ..Default::default()
        }
    }

    /// Register an attached device.
    pub fn add_device(&self, device: DeviceDescriptor) {
        self.devices.lock().push(device);
    }

    /// Mark a device as lacking an access grant.
    pub fn deny_permission(&self, port_name: &str) {
        self.denied.lock().push(port_name.to_string());
    }

    /// Control the outcome of permission requests for denied devices.
    pub fn set_grant_on_request(&self, grant: bool) {
        *self.grant_on_request.lock() = grant;
    }

    /// Make opening the named device fail.
    pub fn fail_open(&self, port_name: &str) {
        self.fail_open.lock().push(port_name.to_string());
    }

    /// Handle onto the most recently opened port with this name, if any.
    pub fn port(&self, port_name: &str) -> Option<MockTransportPort> {
        self.ports.lock().get(port_name).cloned()
    }

    /// Ordered backend/port operation log ("open NAME" / "close NAME").
    pub fn operations(&self) -> Vec<String> {
        self.ops.lock().clone()
    }
}

#[async_trait]
impl SerialBackend for MockBackend {
    fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, PortError> {
        Ok(self.devices.lock().clone())
    }

    fn has_permission(&self, device: &DeviceDescriptor) -> bool {
        !self.denied.lock().contains(&device.port_name)
    }

    async fn request_permission(&self, device: &DeviceDescriptor) -> Result<bool, PortError> {
        if self.has_permission(device) {
            return Ok(true);
        }
        let granted = *self.grant_on_request.lock();
        if granted {
            self.denied.lock().retain(|name| name != &device.port_name);
        }
        Ok(granted)
    }

    fn open(&self, device: &DeviceDescriptor) -> Result<Box<dyn TransportPort>, PortError> {
        self.ops.lock().push(format!("open {}", device.port_name));
        if self.fail_open.lock().contains(&device.port_name) {
            return Err(PortError::not_found(&device.port_name));
        }
        let port = MockTransportPort::with_ops(&device.port_name, Arc::clone(&self.ops));
        self.ports
            .lock()
            .insert(device.port_name.clone(), port.clone());
        Ok(Box::new(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_chunk_preserves_boundaries() {
        let handle = MockTransportPort::new("MOCK0");
        let mut port = handle.clone();
        handle.push_chunk(b"E (1) a\nW ");
        handle.push_chunk(b"(2) b\n");

        let mut buffer = [0u8; 64];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"E (1) a\nW ");
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"(2) b\n");
    }

    #[test]
    fn test_empty_read_is_transient() {
        let mut port = MockTransportPort::new("MOCK0");
        let mut buffer = [0u8; 8];
        let err = port.read_bytes(&mut buffer).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_undersized_buffer_requeues_tail() {
        let handle = MockTransportPort::new("MOCK0");
        let mut port = handle.clone();
        handle.push_chunk(b"abcdef");

        let mut buffer = [0u8; 4];
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"abcd");
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"ef");
    }

    #[test]
    fn test_injected_error_fires_once() {
        let handle = MockTransportPort::new("MOCK0");
        let mut port = handle.clone();
        handle.inject_read_error("device unplugged");
        handle.push_chunk(b"later");

        let mut buffer = [0u8; 8];
        let err = port.read_bytes(&mut buffer).unwrap_err();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("device unplugged"));

        // Subsequent reads resume from the queue.
        let n = port.read_bytes(&mut buffer).unwrap();
        assert_eq!(&buffer[..n], b"later");
    }

    #[test]
    fn test_operations_after_close_fail() {
        let mut port = MockTransportPort::new("MOCK0");
        port.close().unwrap();
        assert!(port.is_closed());
        assert!(matches!(port.write_bytes(b"x"), Err(PortError::NotOpen)));
        assert!(matches!(port.close(), Err(PortError::NotOpen)));
    }

    #[tokio::test]
    async fn test_backend_permission_script() {
        let backend = MockBackend::new();
        let device = DeviceDescriptor::from_port_name("MOCK0");
        backend.add_device(device.clone());
        backend.deny_permission("MOCK0");
        backend.set_grant_on_request(false);

        assert!(!backend.has_permission(&device));
        assert!(!backend.request_permission(&device).await.unwrap());

        backend.set_grant_on_request(true);
        assert!(backend.request_permission(&device).await.unwrap());
        assert!(backend.has_permission(&device));
    }

    #[test]
    fn test_backend_records_open_and_close() {
        let backend = MockBackend::new();
        let device = DeviceDescriptor::from_port_name("MOCK0");
        backend.add_device(device.clone());

        let mut port = backend.open(&device).unwrap();
        port.close().unwrap();
        assert_eq!(backend.operations(), vec!["open MOCK0", "close MOCK0"]);
    }
}
