//! Error types for the settings crate.

use std::io;
use thiserror::Error;

/// Errors that can occur during settings operations.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The configuration file could not be saved.
    #[error("Failed to save settings: {0}")]
    SaveError(String),

    /// The configuration directory could not be found or created.
    #[error("Config directory error: {0}")]
    ConfigDirectory(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A configuration validation error occurred.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors related to configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file format is not supported.
    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// A configuration value is out of valid range.
    #[error("Value out of range for '{key}': {value}")]
    ValueOutOfRange { key: String, value: String },

    /// The engine section was rejected by the engine.
    #[error("Invalid engine settings: {0}")]
    Engine(String),
}

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_error_display() {
        let err = SettingsError::SaveError("disk full".to_string());
        assert_eq!(err.to_string(), "Failed to save settings: disk full");

        let err: SettingsError = ConfigError::ValueOutOfRange {
            key: "connection.baud_rate".to_string(),
            value: "0".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Config error: Value out of range for 'connection.baud_rate': 0"
        );
    }

    #[test]
    fn test_config_error_conversion() {
        let err: SettingsError = ConfigError::UnsupportedFormat("yaml".to_string()).into();
        assert!(matches!(err, SettingsError::Config(_)));
        assert_eq!(
            err.to_string(),
            "Config error: Unsupported config format: yaml"
        );

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: SettingsError = io_err.into();
        assert!(matches!(err, SettingsError::IoError(_)));
    }
}
