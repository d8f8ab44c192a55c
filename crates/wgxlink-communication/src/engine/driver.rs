//! Background operation driver
//!
//! Client connects and network closes put their command on the wire and
//! return. The reply is collected here, one non-blocking step per
//! [`Engine::poll`], and applied to the slot that started the operation.

use super::{Engine, PingReply};
use crate::clock::Clock;
use crate::protocol::{codec, commands, listing, Command, Header};
use crate::transport::Transport;
use wgxlink_core::{CommState, LinkError, StreamStatus, RX_HEADER_LEN};

impl<T: Transport, C: Clock> Engine<T, C> {
    /// Advance background work.
    ///
    /// Runs the async receive, starts pending closes, wakes a sleeping
    /// module and steps the web setup flow. Call at least once a second.
    pub fn poll(&mut self) {
        match self.link.comm {
            CommState::Idle => {
                if self.link.active_async_stream.is_none() {
                    self.start_pending_close();
                }
            }
            CommState::AwaitingHeader | CommState::AwaitingData => self.step_async_receive(),
            CommState::Sleeping => self.check_wake(),
            CommState::Uninitialized => {}
        }

        self.poll_setup();
    }

    /// Hand the reply of a command already on the wire to the driver
    pub(crate) fn begin_async_receive(&mut self, index: usize) {
        self.rx.clear();
        self.async_header = None;
        self.async_started_at = self.clock.now_ms();
        self.link.active_async_stream = Some(index);
        self.link.comm = CommState::AwaitingHeader;
    }

    fn start_pending_close(&mut self) {
        let Some(index) = self.streams.first_with_status(StreamStatus::ClosePending) else {
            return;
        };
        let handle = match self.streams.slot(index) {
            Ok(slot) => slot.handle,
            Err(_) => return,
        };

        if let Err(e) = self.send_armed(&Command::new(commands::CLOSE).handle(handle)) {
            tracing::warn!("Stream {}: close failed to send: {}", index, e);
            return;
        }

        self.begin_async_receive(index);
        if let Ok(slot) = self.streams.slot_mut(index) {
            slot.status = StreamStatus::Closing;
        }
        self.notify_stream(index);
        tracing::debug!("Stream {}: closing handle {}", index, handle);
    }

    fn step_async_receive(&mut self) {
        if self.async_header.is_none() {
            if self.rx.fill_from(&mut self.transport, RX_HEADER_LEN) < RX_HEADER_LEN {
                self.check_async_timeout();
                return;
            }

            match codec::decode_header(self.rx.as_slice()) {
                Ok(header) if header.total_len() <= self.rx.capacity() => {
                    self.async_header = Some(header);
                    self.link.comm = CommState::AwaitingData;
                }
                Ok(header) => {
                    self.finish_async(Err(LinkError::Protocol {
                        reason: format!(
                            "declared length {} exceeds receive buffer",
                            header.payload_len
                        ),
                    }));
                    return;
                }
                Err(e) => {
                    self.finish_async(Err(e));
                    return;
                }
            }
        }

        let Some(header) = self.async_header else {
            return;
        };
        if self.rx.fill_from(&mut self.transport, header.total_len()) < header.total_len() {
            self.check_async_timeout();
            return;
        }

        self.finish_async(Ok(header));
    }

    fn check_async_timeout(&mut self) {
        let timeout_ms = self.config.command_timeout_ms;
        if self.clock.elapsed_since(self.async_started_at) >= timeout_ms {
            tracing::warn!(
                "Background reply incomplete after {}ms ({} bytes)",
                timeout_ms,
                self.rx.len()
            );
            self.finish_async(Err(LinkError::Timeout { timeout_ms }));
        }
    }

    fn finish_async(&mut self, outcome: Result<Header, LinkError>) {
        self.transport.enable_rx_interrupt(false);

        let accepted = match &outcome {
            Ok(header) => header.is_success(),
            Err(e) => {
                tracing::warn!("Background reply failed: {}", e);
                self.record_failure();
                false
            }
        };
        let payload = match &outcome {
            Ok(header) => self.rx.payload(header.total_len()),
            Err(_) => Vec::new(),
        };

        if let Some(index) = self.link.active_async_stream.take() {
            self.apply_async_result(index, accepted, &payload);
        }

        self.async_header = None;
        self.link.comm = CommState::Idle;
    }

    fn apply_async_result(&mut self, index: usize, accepted: bool, payload: &[u8]) {
        let Ok(slot) = self.streams.slot(index).copied() else {
            return;
        };

        match slot.status {
            StreamStatus::Connecting if accepted => {
                if !slot.is_open() {
                    let handle = i8::try_from(listing::atoi(payload)).unwrap_or(-1);
                    self.streams.claim(index, handle);
                }
                self.set_status(index, StreamStatus::Connected);
                tracing::info!("Stream {}: connected", index);
            }
            StreamStatus::Connecting => {
                self.set_status(index, StreamStatus::ConnectFailed);
                tracing::warn!("Stream {}: connect failed", index);
            }
            StreamStatus::Closing => {
                if let Ok(slot) = self.streams.slot_mut(index) {
                    slot.handle = -1;
                }
                let status = if accepted {
                    StreamStatus::Closed
                } else {
                    StreamStatus::Error
                };
                self.set_status(index, status);
                tracing::debug!("Stream {}: {}", index, status);
            }
            _ => {}
        }
    }

    fn set_status(&mut self, index: usize, status: StreamStatus) {
        if let Ok(slot) = self.streams.slot_mut(index) {
            slot.status = status;
        }
        self.notify_stream(index);
    }

    fn check_wake(&mut self) {
        match self.ping() {
            Ok(PingReply::Silent) => {}
            Ok(_) => {
                tracing::info!("Module awake");
                if let Err(e) = self.init_comms() {
                    tracing::warn!("Re-initializing after wake failed: {}", e);
                }
            }
            Err(e) => tracing::warn!("Wake ping failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::transport::scripted::frame;
    use crate::transport::{ScriptedModule, ScriptedTransport};
    use wgxlink_core::{EngineConfig, Protocol, StreamType};

    fn connected_engine() -> (Engine<ScriptedTransport, ManualClock>, ScriptedModule) {
        let (transport, module) = ScriptedTransport::new();
        let mut engine =
            Engine::new(transport, ManualClock::default(), EngineConfig::default()).unwrap();
        engine.initialize().unwrap();
        engine.connect(None, None).unwrap();
        module.clear_sent();
        (engine, module)
    }

    #[test]
    fn test_header_and_data_arrive_separately() {
        let (mut engine, module) = connected_engine();
        module.silence();
        engine
            .open_client(1, Protocol::Tcp, "10.0.0.2", 80, 0)
            .unwrap();

        let reply = frame(0, "4");
        module.deliver(&reply[..5]);
        engine.poll();
        assert_eq!(engine.link_state().comm, CommState::AwaitingHeader);

        module.deliver(&reply[5..10]);
        engine.poll();
        assert_eq!(engine.link_state().comm, CommState::AwaitingData);
        assert_eq!(engine.stream_status(1).unwrap(), StreamStatus::Connecting);

        module.deliver(&reply[10..]);
        engine.poll();
        assert_eq!(engine.link_state().comm, CommState::Idle);
        assert_eq!(engine.stream_status(1).unwrap(), StreamStatus::Connected);
        assert_eq!(engine.streams().slot(1).unwrap().handle, 4);
    }

    #[test]
    fn test_refused_connect() {
        let (mut engine, module) = connected_engine();
        module.reply(1, "");
        engine
            .open_client(0, Protocol::Tls, "example.com", 443, 0)
            .unwrap();
        engine.stream_wait(0).unwrap();
        assert_eq!(engine.stream_status(0).unwrap(), StreamStatus::ConnectFailed);
        assert!(!engine.streams().slot(0).unwrap().is_open());
    }

    #[test]
    fn test_garbled_header_fails_connect() {
        let (mut engine, module) = connected_engine();
        module.reply_raw(b"garbage!!\r\n");
        engine
            .open_client(0, Protocol::Udp, "10.0.0.9", 5000, 0)
            .unwrap();
        engine.poll();
        assert_eq!(engine.stream_status(0).unwrap(), StreamStatus::ConnectFailed);
        assert_eq!(engine.link_state().comm, CommState::Idle);
        assert_eq!(engine.consecutive_failures(), 1);
    }

    #[test]
    fn test_silent_connect_times_out() {
        let (mut engine, module) = connected_engine();
        module.silence();
        engine
            .open_client(0, Protocol::Tcp, "10.0.0.2", 80, 0)
            .unwrap();

        let mut polls = 0;
        while engine.is_stream_busy(0) {
            engine.poll();
            polls += 1;
            assert!(polls < 10_000, "driver never gave up");
        }
        assert_eq!(engine.stream_status(0).unwrap(), StreamStatus::ConnectFailed);
        assert_eq!(engine.link_state().active_async_stream, None);
    }

    #[test]
    fn test_pending_close_runs_when_idle() {
        let (mut engine, module) = connected_engine();
        module.reply(0, "2");
        engine
            .open_client(0, Protocol::Tcp, "10.0.0.2", 80, 0)
            .unwrap();
        engine.stream_wait(0).unwrap();
        assert_eq!(engine.streams().slot(0).unwrap().stream_type, StreamType::TcpClient);

        engine.stream_close(0).unwrap();
        assert_eq!(engine.stream_status(0).unwrap(), StreamStatus::ClosePending);

        module.silence();
        engine.poll();
        assert_eq!(engine.stream_status(0).unwrap(), StreamStatus::Closing);
        assert!(module.commands().last().unwrap().starts_with("close "));

        module.deliver(&frame(0, ""));
        engine.poll();
        assert_eq!(engine.stream_status(0).unwrap(), StreamStatus::Closed);
        assert_eq!(engine.streams().slot(0).unwrap().handle, -1);
    }
}
