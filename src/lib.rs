//! Serial Log Monitor Library
//!
//! Streams textual diagnostic output from a serial-attached embedded device,
//! reassembles arbitrary byte chunks into discrete log lines, classifies each
//! line by ESP-IDF severity prefix and keeps the result queryable (live
//! severity filtering, substring search over history).
//!
//! # Modules
//!
//! - `config`: Configuration management with TOML support
//! - `error`: Unified application error handling
//! - `port`: Transport abstraction layer (real serial hardware + mocks)
//! - `reassembler`: Chunk-to-line reassembly with partial-line carry-over
//! - `classify`: Severity tagging and filter semantics
//! - `store`: Append-only, searchable log history
//! - `events`: Push notifications to subscribers
//! - `connection`: Device-connection lifecycle state machine

pub mod classify;
pub mod config;
pub mod connection;
pub mod error;
pub mod events;
pub mod port;
pub mod reassembler;
pub mod store;

// Re-export commonly used types for convenience
pub use classify::{Color, FilterSet, Severity};
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{AppError, AppResult};
pub use events::{EventBus, MonitorEvent};
pub use port::{
    DeviceDescriptor, LineParameters, MockBackend, MockTransportPort, PortError, SerialBackend,
    SystemBackend, TransportPort,
};
pub use reassembler::LineReassembler;
pub use store::{LogLine, LogStore};
