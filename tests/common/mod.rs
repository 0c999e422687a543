//! Shared test utilities for serial-log-monitor integration tests.

#![allow(dead_code)]

use serial_log_monitor::{
    Config, ConnectionManager, ConnectionState, DeviceDescriptor, MockBackend,
};
use std::sync::Arc;
use std::time::Duration;

/// Config with timings scaled down so lifecycle tests stay fast.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.serial.reset_pulse_ms = 5;
    config.serial.poll_interval_ms = 2;
    config.serial.read_timeout_ms = 5;
    config
}

/// Backend with one registered mock device.
pub fn backend_with_device(port_name: &str) -> (Arc<MockBackend>, DeviceDescriptor) {
    let backend = Arc::new(MockBackend::new());
    let device = DeviceDescriptor {
        port_name: port_name.to_string(),
        vendor_id: Some(0x303a),
        product_id: Some(0x1001),
        product: Some("ESP32-S3".to_string()),
    };
    backend.add_device(device.clone());
    (backend, device)
}

/// Manager already streaming from the named mock device.
pub async fn streaming_manager(
    port_name: &str,
) -> (Arc<MockBackend>, ConnectionManager, DeviceDescriptor) {
    let (backend, device) = backend_with_device(port_name);
    let manager = ConnectionManager::new(backend.clone(), &fast_config());
    manager.select(device.clone()).await.unwrap();
    manager.open(115_200).await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Streaming);
    (backend, manager, device)
}

/// Poll until the predicate holds or a generous deadline expires.
pub async fn wait_until(what: &str, predicate: impl Fn() -> bool) {
    for _ in 0..400 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}
