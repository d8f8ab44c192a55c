//! # WGX Link Core
//!
//! Core types, errors and events shared by the WGX link crates.
//! Provides the error taxonomy, the stream and link state enums,
//! the engine configuration and the event dispatcher.

pub mod config;
pub mod error;
pub mod event;
pub mod types;

pub use config::{EngineConfig, RX_HEADER_LEN};
pub use error::{Error, LinkError, NetworkError, Result, StreamError};
pub use event::{EngineEvent, EventDispatcher};
pub use types::{
    CommState, ConnectionState, Protocol, SetupState, StreamStatus, StreamType,
};
