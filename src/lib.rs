//! # WGX Link
//!
//! Host-side driver for WGX Wi-Fi modules speaking the machine-mode
//! serial protocol.
//!
//! ## Architecture
//!
//! WGX Link is organized as a workspace with multiple crates:
//!
//! 1. **wgxlink-core** - Errors, shared state types, events, engine config
//! 2. **wgxlink-communication** - Wire codec, transports and the engine
//! 3. **wgxlink-settings** - Configuration files
//! 4. **wgxlink** - Logging bootstrap and the demo binary

pub use wgxlink_communication::{
    list_ports, Clock, Command, Engine, FileEntry, LinkState, ManualClock, Response,
    ScanEntry, ScriptedModule, ScriptedTransport, SerialParams, SerialPortInfo,
    SerialTransport, StreamRead, SystemClock, Transport,
};
pub use wgxlink_core::{
    CommState, ConnectionState, EngineConfig, EngineEvent, Error, LinkError, NetworkError,
    Protocol, Result, SetupState, StreamError, StreamStatus, StreamType,
};
pub use wgxlink_settings::{default_config_path, Config, ConnectionSettings};

use anyhow::Context;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("logging already initialized")?;

    Ok(())
}

/// Resolve the serial port named by the settings.
///
/// [`wgxlink_settings::AUTO_PORT`] picks the first port found.
pub fn resolve_port(settings: &ConnectionSettings) -> anyhow::Result<SerialParams> {
    let port = if settings.is_auto() {
        let ports = list_ports().context("listing serial ports")?;
        let first = ports
            .first()
            .context("no serial ports found; set connection.port")?;
        tracing::info!("Auto-selected serial port {}", first.port_name);
        first.port_name.clone()
    } else {
        settings.port.clone()
    };

    Ok(SerialParams {
        port,
        baud_rate: settings.baud_rate,
        read_timeout_ms: settings.read_timeout_ms,
    })
}
