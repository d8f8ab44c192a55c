//! Configuration file handling
//!
//! Supports JSON and TOML files, chosen by extension, stored in the
//! platform config directory by default.
//!
//! Configuration is organized into sections:
//! - Connection settings (serial port, baud rate)
//! - Engine tuning (buffer sizes, timeouts)

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use wgxlink_core::EngineConfig;

/// Port value that selects the first serial port found
pub const AUTO_PORT: &str = "Auto";

/// Serial connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Serial port name, or [`AUTO_PORT`]
    pub port: String,
    /// Baud rate of the module's UART
    pub baud_rate: u32,
    /// Read timeout of the serial reader in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: AUTO_PORT.to_string(),
            baud_rate: 115200,
            read_timeout_ms: 10,
        }
    }
}

impl ConnectionSettings {
    /// Whether the port should be picked automatically
    pub fn is_auto(&self) -> bool {
        self.port.is_empty() || self.port.eq_ignore_ascii_case(AUTO_PORT)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection settings
    pub connection: ConnectionSettings,
    /// Engine tuning
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Toml,
}

fn format_of(path: &Path) -> SettingsResult<Format> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => Ok(Format::Json),
        Some("toml") => Ok(Format::Toml),
        other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("none").to_string()).into()),
    }
}

/// Default config file: `<config dir>/wgxlink/config.toml`
pub fn default_config_path() -> SettingsResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("wgxlink").join("config.toml"))
        .ok_or_else(|| {
            SettingsError::ConfigDirectory("no config directory on this platform".to_string())
        })
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = format_of(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load config from file, falling back to defaults when it does not exist
    pub fn load_or_default(path: &Path) -> SettingsResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file (JSON or TOML), creating parent directories
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match format_of(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)
                .map_err(|e| SettingsError::SaveError(e.to_string()))?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SettingsError::ConfigDirectory(e.to_string()))?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        if self.connection.baud_rate == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "connection.baud_rate".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        if self.connection.read_timeout_ms == 0 {
            return Err(ConfigError::ValueOutOfRange {
                key: "connection.read_timeout_ms".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        self.engine.validate().map_err(ConfigError::Engine)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert!(config.connection.is_auto());
        assert_eq!(config.connection.baud_rate, 115200);
        assert_eq!(config.engine, EngineConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_baud() {
        let mut config = Config::new();
        config.connection.baud_rate = 0;
        assert!(matches!(
            config.validate(),
            Err(SettingsError::Config(ConfigError::ValueOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_engine() {
        let mut config = Config::new();
        config.engine.max_streams = 0;
        assert!(matches!(
            config.validate(),
            Err(SettingsError::Config(ConfigError::Engine(_)))
        ));
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [connection]
            port = "/dev/ttyUSB0"

            [engine]
            command_timeout_ms = 2500
            "#,
        )
        .unwrap();
        assert_eq!(config.connection.port, "/dev/ttyUSB0");
        assert!(!config.connection.is_auto());
        assert_eq!(config.connection.baud_rate, 115200);
        assert_eq!(config.engine.command_timeout_ms, 2500);
        assert_eq!(config.engine.buffer_size, 64);
    }

    #[test]
    fn test_format_by_extension() {
        assert_eq!(format_of(Path::new("a.json")).unwrap(), Format::Json);
        assert_eq!(format_of(Path::new("a.toml")).unwrap(), Format::Toml);
        assert!(format_of(Path::new("a.yaml")).is_err());
        assert!(format_of(Path::new("config")).is_err());
    }
}
