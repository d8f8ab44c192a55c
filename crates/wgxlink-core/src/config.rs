//! Engine tuning parameters
//!
//! Buffer sizes, stream table capacity and the timing constants used by the
//! exchange, the background driver and the web setup controller.

use serde::{Deserialize, Serialize};

/// Length of the machine-mode response header (`R<E><LLLLL>\r\n`).
pub const RX_HEADER_LEN: usize = 9;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest command or reply payload carried in one exchange
    pub buffer_size: usize,
    /// Size of the rolling buffer used to split listings into lines
    pub line_buffer_size: usize,
    /// Number of stream table slots
    pub max_streams: usize,
    /// Budget for one command/response exchange in milliseconds
    pub command_timeout_ms: u64,
    /// Budget for joining a network or running a scan in milliseconds
    pub network_timeout_ms: u64,
    /// Pings sent while waiting for the module before giving up
    pub sync_attempts: u32,
    /// Time to wait for the first bytes of a ping reply
    pub ping_timeout_ms: u64,
    /// Pause between portal status polls during web setup
    pub setup_poll_pause_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64,
            line_buffer_size: 64,
            max_streams: 4,
            command_timeout_ms: 1000,
            network_timeout_ms: 15000,
            sync_attempts: 50,
            ping_timeout_ms: 20,
            setup_poll_pause_ms: 20,
        }
    }
}

impl EngineConfig {
    /// Capacity of the receive buffer: header, payload and trailing CRLF.
    pub fn rx_capacity(&self) -> usize {
        RX_HEADER_LEN + self.buffer_size + 2
    }

    /// Check the configuration for values the engine cannot run with
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.buffer_size < 8 {
            return Err(format!(
                "buffer_size must be at least 8, got {}",
                self.buffer_size
            ));
        }
        if self.buffer_size > usize::from(u16::MAX) {
            return Err(format!(
                "buffer_size {} exceeds the numeric parameter range of {}",
                self.buffer_size,
                u16::MAX
            ));
        }
        if self.line_buffer_size < 4 {
            return Err(format!(
                "line_buffer_size must be at least 4, got {}",
                self.line_buffer_size
            ));
        }
        if self.max_streams == 0 || self.max_streams > i8::MAX as usize {
            return Err(format!(
                "max_streams must be between 1 and {}, got {}",
                i8::MAX,
                self.max_streams
            ));
        }
        if self.command_timeout_ms == 0 {
            return Err("command_timeout_ms must be non-zero".to_string());
        }
        if self.sync_attempts == 0 {
            return Err("sync_attempts must be non-zero".to_string());
        }
        Ok(())
    }
}
