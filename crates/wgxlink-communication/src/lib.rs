//! # WGX Link Communication
//!
//! Machine-mode protocol engine for WGX Wi-Fi modules.
//! Frames commands and parses responses, tracks module streams, drives
//! client connects and closes in the background, and manages Wi-Fi
//! association and the captive web setup flow.
//!
//! The engine is transport agnostic: [`SerialTransport`] talks to a module
//! on a serial port and [`ScriptedTransport`] stands in for one in tests.

pub mod clock;
pub mod engine;
pub mod protocol;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Engine, LinkState, Response, StreamRead, StreamSlot, StreamTable};
pub use protocol::{
    Command, FileEntry, Header, ResponseCode, ScanEntry, StreamHandle, StreamListEntry,
};
pub use transport::{
    list_ports, RxRing, ScriptedModule, ScriptedTransport, SerialParams, SerialPortInfo,
    SerialTransport, Transport,
};
