//! Configuration error types.

use thiserror::Error;

/// A specialized `Result` for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the config file failed.
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for our schema.
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serializing the config back to TOML failed.
    #[error("Config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// An environment override carried an unusable value.
    #[error("Invalid config value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}
