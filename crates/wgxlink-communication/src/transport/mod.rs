//! Byte transports
//!
//! The engine talks to the module through the [`Transport`] trait. The
//! receive side of every transport is interrupt-shaped: something outside
//! the engine (a UART ISR, a reader thread, a test double) appends bytes to
//! an [`RxRing`] while the receive interrupt is enabled, and the engine
//! drains it from `execute()` or `poll()`.

pub mod scripted;
pub mod serial;

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use wgxlink_core::Result;

pub use scripted::{ScriptedModule, ScriptedTransport};
pub use serial::{list_ports, SerialParams, SerialPortInfo, SerialTransport};

/// Byte transport to the module
pub trait Transport: Send {
    /// Start transmitting `data`
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Bytes still waiting to leave the transmit FIFO
    fn tx_fifo_depth(&self) -> usize;

    /// Move received bytes into `buf` without blocking, returning the count
    fn read_into(&mut self, buf: &mut [u8]) -> usize;

    /// Bytes received and not yet read
    fn rx_pending(&self) -> usize;

    /// Drop everything received so far
    fn clear_rx(&mut self);

    /// Enable or disable reception; bytes arriving while disabled are lost
    fn enable_rx_interrupt(&mut self, enabled: bool);

    /// Human readable name for logs
    fn name(&self) -> String;
}

/// Receive ring filled from interrupt context
///
/// Producers only call [`RxRing::push`]; no protocol logic runs there.
#[derive(Debug)]
pub struct RxRing {
    bytes: Mutex<VecDeque<u8>>,
    capacity: usize,
    enabled: AtomicBool,
}

impl RxRing {
    /// Create a disabled ring holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            enabled: AtomicBool::new(false),
        }
    }

    /// Append received bytes, returning how many were kept
    pub fn push(&self, data: &[u8]) -> usize {
        if !self.enabled.load(Ordering::Acquire) {
            return 0;
        }

        let mut bytes = self.bytes.lock();
        let room = self.capacity.saturating_sub(bytes.len());
        let kept = room.min(data.len());
        bytes.extend(&data[..kept]);
        if kept < data.len() {
            tracing::warn!("rx ring overflow, dropped {} bytes", data.len() - kept);
        }
        kept
    }

    /// Move up to `buf.len()` bytes out of the ring
    pub fn pop_into(&self, buf: &mut [u8]) -> usize {
        let mut bytes = self.bytes.lock();
        let count = buf.len().min(bytes.len());
        for (slot, byte) in buf.iter_mut().zip(bytes.drain(..count)) {
            *slot = byte;
        }
        count
    }

    /// Bytes currently buffered
    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    /// Whether the ring is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all buffered bytes
    pub fn clear(&self) {
        self.bytes.lock().clear();
    }

    /// Enable or disable the producer side
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Whether the producer side is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}
