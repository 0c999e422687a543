//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use std::path::{Path, PathBuf};

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable for an explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_LOG_MONITOR_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_LOG_MONITOR_CONFIG` environment variable (explicit path)
    /// 2. `./config.toml` (current directory)
    /// 3. Platform config dir (`~/.config/serial-log-monitor/config.toml` on
    ///    Linux, the equivalents elsewhere)
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override individual values afterwards.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match &config_path {
            Some(path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Env overrides apply even without a file.
        let _ = apply_env_overrides(&mut config);

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let rendered = toml::to_string_pretty(&self.config)?;
        std::fs::write(path, rendered)?;
        Ok(())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    if let Some(dirs) = directories::ProjectDirs::from("", "", "serial-log-monitor") {
        let path = dirs.config_dir().join(CONFIG_FILE_NAME);
        if path.exists() {
            return Some(path);
        }
    }

    None
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let contents = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

/// Apply `SERIAL_LOG_MONITOR_*` environment overrides to individual values.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    if let Some(baud) = env_parse::<u32>("SERIAL_LOG_MONITOR_SERIAL_DEFAULT_BAUD")? {
        config.serial.default_baud = baud;
    }
    if let Some(ms) = env_parse::<u64>("SERIAL_LOG_MONITOR_SERIAL_RESET_PULSE_MS")? {
        config.serial.reset_pulse_ms = ms;
    }
    if let Some(ms) = env_parse::<u64>("SERIAL_LOG_MONITOR_SERIAL_READ_TIMEOUT_MS")? {
        config.serial.read_timeout_ms = ms;
    }
    if let Ok(level) = std::env::var("SERIAL_LOG_MONITOR_LOG_LEVEL") {
        config.logging.level = level;
    }
    Ok(())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> ConfigResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::invalid_value(key, format!("cannot parse {raw:?}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[serial]\ndefault_baud = 9600\nreset_pulse_ms = 250\n\n[logging]\nlevel = \"debug\""
        )
        .unwrap();

        let loader = ConfigLoader::load_from(file.path()).unwrap();
        assert_eq!(loader.config().serial.default_baud, 9600);
        assert_eq!(loader.config().serial.reset_pulse_ms, 250);
        assert_eq!(loader.config().logging.level, "debug");
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let result = ConfigLoader::load_from("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_malformed_file_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[serial]\ndefault_baud = \"not a number\"").unwrap();

        let result = ConfigLoader::load_from(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut loader = ConfigLoader::with_defaults();
        loader.config.serial.default_baud = 57_600;
        loader.save_to(&path).unwrap();

        let reloaded = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(reloaded.config().serial.default_baud, 57_600);
    }
}
