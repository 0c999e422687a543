//! Configuration module for serial-log-monitor.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `SERIAL_LOG_MONITOR_CONFIG` environment variable (explicit path)
//! 2. `./config.toml` (current directory)
//! 3. Platform config dir via `directories` (XDG on Linux/macOS, `%APPDATA%` on Windows)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! - `SERIAL_LOG_MONITOR_SERIAL_DEFAULT_BAUD=921600`
//! - `SERIAL_LOG_MONITOR_SERIAL_RESET_PULSE_MS=250`
//! - `SERIAL_LOG_MONITOR_SERIAL_READ_TIMEOUT_MS=50`
//! - `SERIAL_LOG_MONITOR_LOG_LEVEL=debug`

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{resolve_config_path, ConfigLoader};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig};
