//! Synchronous command/response exchange

use super::Engine;
use crate::clock::Clock;
use crate::protocol::{codec, commands, response_code, Command};
use crate::transport::Transport;
use wgxlink_core::{CommState, EngineEvent, LinkError, Result, RX_HEADER_LEN};

/// A complete module response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Error digit from the header, 0 on success
    pub code: u8,
    /// Header plus payload length
    pub total_len: usize,
    /// Payload bytes as sent by the module, trailing CRLF included
    pub payload: Vec<u8>,
}

impl Response {
    /// Payload as text without the trailing line ending
    pub fn text(&self) -> String {
        let body = self
            .payload
            .strip_suffix(codec::LINE_END)
            .unwrap_or(&self.payload);
        String::from_utf8_lossy(body).into_owned()
    }
}

/// Receive buffer: header, payload and the payload's CRLF
#[derive(Debug)]
pub(crate) struct RxBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl RxBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn clear(&mut self) {
        self.data.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Drain the transport until `want` bytes are buffered or it runs dry.
    ///
    /// Never reads past `want`, so a second response queued behind this one
    /// stays in the transport.
    pub(crate) fn fill_from<T: Transport>(&mut self, transport: &mut T, want: usize) -> usize {
        let start = self.data.len();
        let target = want.min(self.capacity);
        if start >= target {
            return start;
        }

        self.data.resize(target, 0);
        let read = transport.read_into(&mut self.data[start..]);
        self.data.truncate(start + read);
        self.data.len()
    }

    pub(crate) fn payload(&self, total_len: usize) -> Vec<u8> {
        self.data
            .get(RX_HEADER_LEN..total_len.min(self.data.len()))
            .unwrap_or(&[])
            .to_vec()
    }
}

impl<T: Transport, C: Clock> Engine<T, C> {
    /// Run one command and return the module's response
    pub fn execute(&mut self, command: &Command) -> Result<Response> {
        self.execute_with_timeout(command, self.config.command_timeout_ms)
    }

    /// Run a command given as its four fragments
    pub fn command(
        &mut self,
        cmd0: &str,
        cmd1: Option<&str>,
        param0: Option<&str>,
        param1: Option<&str>,
    ) -> Result<Response> {
        let command = Command::new(cmd0)
            .arg_opt(cmd1)
            .arg_opt(param0)
            .arg_opt(param1);
        self.execute(&command)
    }

    /// Set a module variable
    pub fn set(&mut self, variable: &str, value: &str) -> Result<()> {
        self.execute(&Command::new(commands::SET).arg(variable).arg(value))
            .map(|_| ())
    }

    /// Read a module variable.
    ///
    /// With `max_len == 1` exactly one raw character is returned; otherwise
    /// the value is cut to `max_len - 1` characters.
    pub fn get(&mut self, variable: &str, max_len: usize) -> Result<String> {
        let response = self.execute(&Command::new(commands::GET).arg(variable))?;

        if max_len == 1 {
            return Ok(response
                .payload
                .first()
                .map(|&b| char::from(b).to_string())
                .unwrap_or_default());
        }

        Ok(response
            .text()
            .chars()
            .take(max_len.saturating_sub(1))
            .collect())
    }

    /// Firmware version string
    pub fn version(&mut self) -> Result<String> {
        self.execute(&Command::new(commands::VERSION))
            .map(|response| response.text().trim().to_string())
    }

    /// Persist module variables to flash
    pub fn save(&mut self) -> Result<()> {
        self.execute(&Command::new(commands::SAVE)).map(|_| ())
    }

    pub(crate) fn execute_with_timeout(
        &mut self,
        command: &Command,
        timeout_ms: u64,
    ) -> Result<Response> {
        if self.link.comm != CommState::Idle {
            return Err(LinkError::Busy.into());
        }

        self.send_armed(command)?;
        let response = self.receive_response(timeout_ms);
        self.transport.enable_rx_interrupt(false);
        response
    }

    /// Read up to `len` bytes from module stream `handle`.
    ///
    /// The CRLF the module appends to non-empty reads is dropped.
    pub(crate) fn read_chunk(&mut self, handle: i8, len: usize) -> Result<Vec<u8>> {
        let len = u16::try_from(len).unwrap_or(u16::MAX);
        let response =
            self.execute(&Command::new(commands::READ).handle(handle).number(len))?;

        let mut data = response.payload;
        if data.len() > 2 {
            data.truncate(data.len() - 2);
        }
        Ok(data)
    }

    /// Transmit a command with the receiver armed for its reply
    pub(crate) fn send_armed(&mut self, command: &Command) -> Result<()> {
        let bytes = command.encode(self.config.buffer_size)?;

        self.transport.clear_rx();
        self.transport.enable_rx_interrupt(true);

        tracing::debug!("-> {}", command);
        if let Err(e) = self.transmit(&bytes) {
            self.transport.enable_rx_interrupt(false);
            return Err(e);
        }
        Ok(())
    }

    /// Transmit a command whose reply is ignored
    pub(crate) fn send_raw(&mut self, command: &Command) -> Result<()> {
        let bytes = command.encode(self.config.buffer_size)?;
        tracing::debug!("-> {} (no reply)", command);
        self.transmit(&bytes)
    }

    /// Write bytes and wait for the transmit FIFO to drain
    pub(crate) fn transmit(&mut self, bytes: &[u8]) -> Result<()> {
        self.transport.write(bytes)?;

        let start = self.clock.now_ms();
        while self.transport.tx_fifo_depth() > 0 {
            if self.clock.elapsed_since(start) >= self.config.command_timeout_ms {
                return Err(LinkError::Timeout {
                    timeout_ms: self.config.command_timeout_ms,
                }
                .into());
            }
            std::hint::spin_loop();
        }
        Ok(())
    }

    /// Wait for one framed response on the armed receiver
    pub(crate) fn receive_response(&mut self, timeout_ms: u64) -> Result<Response> {
        let start = self.clock.now_ms();
        let timed_out = |clock: &C| clock.elapsed_since(start) >= timeout_ms;

        self.rx.clear();
        while self.rx.fill_from(&mut self.transport, RX_HEADER_LEN) < RX_HEADER_LEN {
            if timed_out(&self.clock) {
                tracing::warn!("No response header within {}ms", timeout_ms);
                self.record_failure();
                return Err(LinkError::Timeout { timeout_ms }.into());
            }
            std::hint::spin_loop();
        }

        let header = match codec::decode_header(self.rx.as_slice()) {
            Ok(header) => header,
            Err(e) => {
                tracing::warn!("Bad response header: {}", e);
                self.record_failure();
                return Err(e.into());
            }
        };

        let total_len = header.total_len();
        if total_len > self.rx.capacity() {
            tracing::warn!(
                "Response declares {} bytes, receive buffer holds {}",
                total_len,
                self.rx.capacity()
            );
            self.record_failure();
            return Err(LinkError::Protocol {
                reason: format!(
                    "declared length {} exceeds receive buffer of {}",
                    header.payload_len,
                    self.rx.capacity()
                ),
            }
            .into());
        }

        while self.rx.fill_from(&mut self.transport, total_len) < total_len {
            if timed_out(&self.clock) {
                tracing::warn!(
                    "Response payload incomplete after {}ms ({} of {} bytes)",
                    timeout_ms,
                    self.rx.len(),
                    total_len
                );
                self.record_failure();
                return Err(LinkError::Timeout { timeout_ms }.into());
            }
            std::hint::spin_loop();
        }

        if !header.is_success() {
            tracing::debug!("<- {}", response_code::format_rejection(header.code));
            self.record_failure();
            return Err(LinkError::CommandRejected { code: header.code }.into());
        }

        tracing::debug!("<- R{} {} bytes", header.code, header.payload_len);
        self.link.consecutive_failures = 0;

        Ok(Response {
            code: header.code,
            total_len,
            payload: self.rx.payload(total_len),
        })
    }

    pub(crate) fn record_failure(&mut self) {
        self.link.consecutive_failures = self.link.consecutive_failures.saturating_add(1);
        self.events.publish(EngineEvent::ExchangeFailed {
            consecutive_failures: self.link.consecutive_failures,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::transport::scripted::frame;
    use crate::transport::{ScriptedModule, ScriptedTransport};
    use wgxlink_core::{EngineConfig, Error};

    fn ready_engine() -> (Engine<ScriptedTransport, ManualClock>, ScriptedModule) {
        let (transport, module) = ScriptedTransport::new();
        let mut engine =
            Engine::new(transport, ManualClock::default(), EngineConfig::default()).unwrap();
        engine.initialize().unwrap();
        module.clear_sent();
        (engine, module)
    }

    #[test]
    fn test_get_single_character() {
        let (mut engine, module) = ready_engine();
        module.reply(0, "2");
        assert_eq!(engine.get("wl n s", 2).unwrap(), "2");
        assert_eq!(module.commands(), vec!["get wl n s"]);

        module.reply(0, "2");
        assert_eq!(engine.get("wl n s", 1).unwrap(), "2");
    }

    #[test]
    fn test_get_truncates() {
        let (mut engine, module) = ready_engine();
        module.reply(0, "10.0.0.12");
        assert_eq!(engine.get("wl n i", 5).unwrap(), "10.0");
    }

    #[test]
    fn test_rejection_counts_failure() {
        let (mut engine, module) = ready_engine();
        module.reply(6, "");
        let err = engine.get("no such var", 8).unwrap_err();
        assert_eq!(err.rejection_code(), Some(6));
        assert_eq!(engine.consecutive_failures(), 1);

        module.reply(0, "1.2.3");
        assert_eq!(engine.version().unwrap(), "1.2.3");
        assert_eq!(engine.consecutive_failures(), 0);
    }

    #[test]
    fn test_timeout_when_module_silent() {
        let (mut engine, module) = ready_engine();
        module.silence();
        let err = engine.command("ver", None, None, None).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(engine.consecutive_failures(), 1);
        assert_eq!(engine.link_state().comm, CommState::Idle);
    }

    #[test]
    fn test_silent_module_blocks_for_one_timeout() {
        let (transport, module) = ScriptedTransport::new();
        let clock = ManualClock::default();
        let mut engine =
            Engine::new(transport, clock.clone(), EngineConfig::default()).unwrap();
        engine.initialize().unwrap();
        let timeout_ms = engine.config().command_timeout_ms;

        module.silence();
        let before = clock.peek();
        let err = engine.command("ver", None, None, None).unwrap_err();
        let elapsed = clock.peek() - before;

        assert!(err.is_timeout());
        assert!(elapsed >= timeout_ms);
        assert!(elapsed <= timeout_ms + 10, "blocked for {}ms", elapsed);
    }

    #[test]
    fn test_partial_payload_times_out() {
        let (mut engine, module) = ready_engine();
        module.reply_raw(b"R000010\r\nabc");
        assert!(engine.version().unwrap_err().is_timeout());
    }

    #[test]
    fn test_bad_marker_is_protocol_error() {
        let (mut engine, module) = ready_engine();
        module.reply_raw(b"X000000\r\n");
        let err = engine.save().unwrap_err();
        assert!(matches!(err, Error::Link(LinkError::Protocol { .. })));
        assert_eq!(engine.consecutive_failures(), 1);
    }

    #[test]
    fn test_oversized_response_is_protocol_error() {
        let (mut engine, module) = ready_engine();
        module.reply_raw(b"R000500\r\n");
        let err = engine.version().unwrap_err();
        assert!(matches!(err, Error::Link(LinkError::Protocol { .. })));
    }

    #[test]
    fn test_framing_error_sends_nothing() {
        let (mut engine, module) = ready_engine();
        let long = "x".repeat(80);
        let err = engine.set("wl s ", &long).unwrap_err();
        assert!(matches!(err, Error::Link(LinkError::Framing { .. })));
        assert!(module.sent().is_empty());
    }

    #[test]
    fn test_second_response_stays_queued() {
        let (mut engine, module) = ready_engine();
        engine.transport.clear_rx();
        engine.transport.enable_rx_interrupt(true);
        module.deliver(&frame(0, "first"));
        module.deliver(&frame(0, "second"));

        let first = engine.receive_response(100).unwrap();
        let second = engine.receive_response(100).unwrap();
        assert_eq!(first.text(), "first");
        assert_eq!(second.text(), "second");
    }
}
