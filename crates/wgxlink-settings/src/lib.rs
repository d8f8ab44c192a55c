//! WGX Link Settings Crate
//!
//! Handles application configuration and its persistence.

pub mod config;
pub mod error;

pub use config::{default_config_path, Config, ConnectionSettings, AUTO_PORT};
pub use error::{ConfigError, SettingsError, SettingsResult};
