//! Configuration schema definitions.
//!
//! Structure of the configuration file, defined with serde. Every section has
//! full defaults so the monitor runs without any file present.

use crate::classify::FilterSet;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial connection settings
    pub serial: SerialConfig,
    /// Initial severity visibility flags
    pub filters: FilterSet,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Serial connection section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate used when the operator does not pick one
    pub default_baud: u32,
    /// Read timeout applied to the port; bounds reader-thread shutdown latency
    pub read_timeout_ms: u64,
    /// Size of the reader's receive buffer in bytes
    pub read_buffer_bytes: usize,
    /// DTR/RTS reset pulse width; resets an attached microcontroller on open
    pub reset_pulse_ms: u64,
    /// Reader back-off between empty polls
    pub poll_interval_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            default_baud: 115_200,
            read_timeout_ms: 100,
            read_buffer_bytes: 1024,
            reset_pulse_ms: 500,
            poll_interval_ms: 10,
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reset_pulse(&self) -> Duration {
        Duration::from_millis(self.reset_pulse_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "pretty", "compact", "json"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self::Pretty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.serial.default_baud, 115_200);
        assert_eq!(config.serial.reset_pulse_ms, 500);
        assert!(config.filters.verbose);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[serial]"));
        assert!(toml_str.contains("[filters]"));
        assert!(toml_str.contains("[logging]"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let toml_str = r#"
            [serial]
            default_baud = 921600

            [filters]
            verbose = false
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.serial.default_baud, 921_600);
        assert!(!config.filters.verbose);
        // Defaults still apply to unspecified fields
        assert_eq!(config.serial.reset_pulse_ms, 500);
        assert!(config.filters.error);
    }
}
