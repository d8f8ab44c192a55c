//! Stream table and stream operations

use super::Engine;
use crate::clock::Clock;
use crate::protocol::{commands, listing, Command};
use crate::transport::Transport;
use wgxlink_core::{
    CommState, ConnectionState, LinkError, NetworkError, Protocol, Result, SetupState,
    StreamError, StreamStatus, StreamType,
};

/// One slot of the stream table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSlot {
    pub stream_type: StreamType,
    /// Module handle, `-1` when the slot is free
    pub handle: i8,
    pub status: StreamStatus,
}

impl Default for StreamSlot {
    fn default() -> Self {
        Self {
            stream_type: StreamType::None,
            handle: -1,
            status: StreamStatus::Ok,
        }
    }
}

impl StreamSlot {
    /// Whether the slot holds a module handle
    pub fn is_open(&self) -> bool {
        self.handle >= 0
    }

    fn release(&mut self, status: StreamStatus) {
        self.handle = -1;
        self.status = status;
    }
}

/// Fixed-size table of stream slots indexed by the caller
#[derive(Debug, Clone)]
pub struct StreamTable {
    slots: Vec<StreamSlot>,
}

impl StreamTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![StreamSlot::default(); capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: usize) -> std::result::Result<&StreamSlot, StreamError> {
        let capacity = self.capacity();
        self.slots
            .get(index)
            .ok_or(StreamError::InvalidStream { index, capacity })
    }

    pub fn slot_mut(
        &mut self,
        index: usize,
    ) -> std::result::Result<&mut StreamSlot, StreamError> {
        let capacity = self.capacity();
        self.slots
            .get_mut(index)
            .ok_or(StreamError::InvalidStream { index, capacity })
    }

    /// Whether any slot holds `handle`
    pub fn is_handle_open(&self, handle: i8) -> bool {
        handle >= 0 && self.slots.iter().any(|slot| slot.handle == handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamSlot> {
        self.slots.iter()
    }

    pub(crate) fn reset_all(&mut self) {
        self.slots.fill(StreamSlot::default());
    }

    pub(crate) fn first_with_status(&self, status: StreamStatus) -> Option<usize> {
        self.slots.iter().position(|slot| slot.status == status)
    }

    /// Give `handle` to slot `index`.
    ///
    /// A handle the module hands out again belongs to a stream that no
    /// longer exists, so any other slot still holding it is released.
    /// Returns that slot's index.
    pub(crate) fn claim(&mut self, index: usize, handle: i8) -> Option<usize> {
        let stale = if handle >= 0 {
            (0..self.slots.len()).find(|&i| i != index && self.slots[i].handle == handle)
        } else {
            None
        };

        if let Some(other) = stale {
            self.slots[other].release(StreamStatus::Closed);
        }
        if let Some(slot) = self.slots.get_mut(index) {
            slot.handle = handle;
        }
        stale
    }

    /// Release every slot whose type matches `filter`
    pub(crate) fn release_where(&mut self, filter: impl Fn(&StreamSlot) -> bool) -> Vec<usize> {
        let mut released = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if filter(slot) {
                slot.release(StreamStatus::Closed);
                released.push(index);
            }
        }
        released
    }
}

/// Outcome of a stream read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRead {
    /// Bytes copied into the destination
    Data(usize),
    /// Nothing buffered right now
    Empty,
    /// The peer closed and everything it sent has been read; the slot is free
    RemoteClosed,
}

impl<T: Transport, C: Clock> Engine<T, C> {
    /// Open a client connection on slot `index`.
    ///
    /// Returns once the connect command is on the wire; the connection
    /// completes in the background. Watch [`Engine::stream_status`] or call
    /// [`Engine::stream_wait`].
    pub fn open_client(
        &mut self,
        index: usize,
        protocol: Protocol,
        ip: &str,
        port: u16,
        local_port: u16,
    ) -> Result<()> {
        if self.streams.slot(index)?.is_open() {
            return Err(StreamError::AlreadyOpen { stream: index }.into());
        }

        if self.link.comm != CommState::Idle
            || self.link.setup != SetupState::Idle
            || self.link.active_async_stream.is_some()
        {
            return Err(LinkError::Busy.into());
        }

        if self.link.connection == ConnectionState::Disconnected {
            return Err(NetworkError::NoConnection.into());
        }

        let (keyword, local_keyword, stream_type) = match protocol {
            Protocol::Udp => (commands::UDP_CLIENT, commands::UDP_CLIENT, StreamType::UdpClient),
            Protocol::Tcp => (
                commands::TCP_CLIENT,
                commands::TCP_CLIENT_LOCAL,
                StreamType::TcpClient,
            ),
            Protocol::Tls => (
                commands::TLS_CLIENT,
                commands::TLS_CLIENT_LOCAL,
                StreamType::TlsClient,
            ),
        };

        let command = if local_port == 0 || protocol == Protocol::Udp {
            Command::new(keyword).arg(ip).number(port)
        } else {
            Command::new(local_keyword)
                .number(local_port)
                .arg(format!(" {}", ip))
                .number(port)
        };

        self.streams.slot_mut(index)?.status = StreamStatus::Error;
        self.send_armed(&command)?;
        self.begin_async_receive(index);

        let slot = self.streams.slot_mut(index)?;
        slot.stream_type = stream_type;
        slot.status = StreamStatus::Connecting;
        self.line_reader.reset();
        self.notify_stream(index);

        tracing::info!("Stream {}: {} connect to {}:{}", index, protocol, ip, port);
        Ok(())
    }

    /// Start a server on the active interface
    pub fn start_server(&mut self, protocol: Protocol, local_port: u16) -> Result<()> {
        if self.link.setup != SetupState::Idle {
            return Err(NetworkError::SetupActive.into());
        }

        let iface = self.interface()?;
        let command = match protocol {
            Protocol::Udp => Command::new(commands::UDP_SERVER)
                .arg(commands::START)
                .number(local_port),
            Protocol::Tcp => Command::new(commands::TCP_SERVER)
                .arg(iface)
                .arg(commands::START)
                .number(local_port),
            Protocol::Tls => {
                return Err(StreamError::UnsupportedProtocol {
                    protocol: protocol.to_string(),
                    operation: "server".to_string(),
                }
                .into())
            }
        };

        self.execute(&command)?;
        tracing::info!("{} server listening on port {}", protocol, local_port);
        Ok(())
    }

    /// Stop a server; every stream it accepted is released
    pub fn stop_server(&mut self, protocol: Protocol, local_port: u16) -> Result<()> {
        let (keyword, server_type) = match protocol {
            Protocol::Udp => (commands::UDP_SERVER, StreamType::UdpServer),
            Protocol::Tcp => (commands::TCP_SERVER, StreamType::TcpServer),
            Protocol::Tls => {
                return Err(StreamError::UnsupportedProtocol {
                    protocol: protocol.to_string(),
                    operation: "server".to_string(),
                }
                .into())
            }
        };

        // the module closes the server's streams on its own
        for index in self
            .streams
            .release_where(|slot| slot.stream_type == server_type)
        {
            self.notify_stream(index);
        }

        self.execute(
            &Command::new(keyword)
                .arg(commands::STOP)
                .number(local_port),
        )?;
        tracing::info!("{} server on port {} stopped", protocol, local_port);
        Ok(())
    }

    /// Claim a connection the module accepted on a `protocol` server.
    ///
    /// Fails with `NoConnection` when no unclaimed connection is waiting;
    /// the slot is left free.
    pub fn accept(&mut self, protocol: Protocol, index: usize) -> Result<()> {
        if self.streams.slot(index)?.is_open() {
            return Err(StreamError::AlreadyOpen { stream: index }.into());
        }

        if self.link.comm != CommState::Idle {
            return Err(LinkError::Busy.into());
        }

        if self.link.connection == ConnectionState::Disconnected {
            return Err(NetworkError::NoConnection.into());
        }

        let wanted = match protocol {
            Protocol::Udp => StreamType::UdpServer,
            Protocol::Tcp => StreamType::TcpServer,
            Protocol::Tls => StreamType::TlsServer,
        };

        if let Err(e) = self.open_listing(
            index,
            &Command::new(commands::LIST),
            self.config.command_timeout_ms,
            1,
        ) {
            self.streams.slot_mut(index)?.status = StreamStatus::Error;
            return Err(e);
        }

        let mut found = None;
        while let Some(line) = self.read_line(index)? {
            let entry = match listing::parse_stream_row(&line) {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Stream listing: {}", e);
                    break;
                }
            };

            if self.streams.is_handle_open(entry.handle) {
                continue;
            }
            if entry.stream_type == wanted {
                found = Some(entry);
                break;
            }
        }

        // listing streams always close synchronously
        if let Err(e) = self.close_stream(index) {
            tracing::warn!("Closing stream listing failed: {}", e);
        }

        match found {
            Some(entry) => {
                let slot = self.streams.slot_mut(index)?;
                slot.stream_type = entry.stream_type;
                slot.status = StreamStatus::Connected;
                self.streams.claim(index, entry.handle);
                self.notify_stream(index);
                tracing::info!(
                    "Stream {}: accepted {} handle {}",
                    index,
                    entry.stream_type,
                    entry.handle
                );
                Ok(())
            }
            None => {
                self.streams.slot_mut(index)?.release(StreamStatus::Closed);
                Err(NetworkError::NoConnection.into())
            }
        }
    }

    /// Read from a stream into `dest`.
    ///
    /// At most `buffer_size` bytes are read. An empty read polls the stream,
    /// and when the peer has closed, the slot is closed and
    /// [`StreamRead::RemoteClosed`] returned.
    pub fn stream_read(&mut self, index: usize, dest: &mut [u8]) -> Result<StreamRead> {
        let slot = *self.streams.slot(index)?;
        if !slot.is_open() {
            return Err(StreamError::NotInitialized { stream: index }.into());
        }
        if self.link.comm != CommState::Idle {
            return Err(LinkError::Busy.into());
        }

        let len = dest.len().min(self.config.buffer_size);
        let data = self.read_chunk(slot.handle, len)?;

        if data.is_empty() {
            let poll = Command::new(commands::POLL).handle(slot.handle);
            match self.execute(&poll) {
                Ok(response) if response.payload.first() == Some(&commands::POLL_REMOTE_CLOSED) => {
                    tracing::info!("Stream {}: remote closed", index);
                    // nothing left to read, so close over the wire right away
                    self.streams.slot_mut(index)?.stream_type = StreamType::Command;
                    self.close_stream(index)?;
                    return Ok(StreamRead::RemoteClosed);
                }
                Ok(_) => {}
                Err(e) => tracing::debug!("Stream {}: poll failed: {}", index, e),
            }
            return Ok(StreamRead::Empty);
        }

        let count = data.len().min(len);
        dest[..count].copy_from_slice(&data[..count]);
        Ok(StreamRead::Data(count))
    }

    /// Write to a stream, returning the number of bytes sent.
    ///
    /// At most `buffer_size` bytes go out per call.
    pub fn stream_write(&mut self, index: usize, data: &[u8]) -> Result<usize> {
        let slot = *self.streams.slot(index)?;
        if !slot.is_open() {
            return Err(StreamError::NotInitialized { stream: index }.into());
        }
        if self.link.comm != CommState::Idle {
            return Err(LinkError::Busy.into());
        }

        let count = data
            .len()
            .min(self.config.buffer_size)
            .min(usize::from(u16::MAX));
        let len = u16::try_from(count).unwrap_or(u16::MAX);
        let command = Command::new(commands::WRITE).handle(slot.handle).number(len);

        self.send_armed(&command)?;
        let sent = self
            .transmit(&data[..count])
            .and_then(|_| self.transmit(crate::protocol::codec::LINE_END));
        if let Err(e) = sent {
            self.transport.enable_rx_interrupt(false);
            return Err(e);
        }

        // one reply for the command, one for the data
        let timeout = self.config.command_timeout_ms;
        let outcome = self
            .receive_response(timeout)
            .and_then(|_| self.receive_response(timeout));
        self.transport.enable_rx_interrupt(false);
        outcome.map(|_| count)
    }

    /// Write a string to a stream
    pub fn stream_write_str(&mut self, index: usize, text: &str) -> Result<usize> {
        self.stream_write(index, text.as_bytes())
    }

    /// Close a stream.
    ///
    /// Command and file streams close at once. Network streams are marked
    /// close-pending and closed by the background driver.
    pub fn stream_close(&mut self, index: usize) -> Result<()> {
        if !self.streams.slot(index)?.is_open() {
            return Err(StreamError::NotInitialized { stream: index }.into());
        }
        if self.link.comm != CommState::Idle {
            return Err(LinkError::Busy.into());
        }
        self.close_stream(index)
    }

    /// Status of slot `index`
    pub fn stream_status(&self, index: usize) -> Result<StreamStatus> {
        Ok(self.streams.slot(index)?.status)
    }

    /// Whether a connect or close is still running for slot `index`
    pub fn is_stream_busy(&self, index: usize) -> bool {
        self.streams
            .slot(index)
            .map(|slot| slot.status.is_busy())
            .unwrap_or(false)
    }

    /// Poll until the slot's background operation finishes.
    ///
    /// Gives up after the command timeout with `WaitTimeout`.
    pub fn stream_wait(&mut self, index: usize) -> Result<()> {
        self.streams.slot(index)?;
        let start = self.clock.now_ms();
        let timeout_ms = self.config.command_timeout_ms;

        while self.is_stream_busy(index) && self.clock.elapsed_since(start) < timeout_ms {
            self.poll();
        }

        if self.is_stream_busy(index) {
            return Err(StreamError::WaitTimeout {
                stream: index,
                timeout_ms,
            }
            .into());
        }
        Ok(())
    }

    pub(crate) fn close_stream(&mut self, index: usize) -> Result<()> {
        let slot = *self.streams.slot(index)?;
        if slot.status.is_closing() {
            return Ok(());
        }

        if slot.stream_type.requires_async_close() {
            self.streams.slot_mut(index)?.status = StreamStatus::ClosePending;
            self.notify_stream(index);
            return Ok(());
        }

        self.send_armed(&Command::new(commands::CLOSE).handle(slot.handle))?;
        self.streams.slot_mut(index)?.release(StreamStatus::Closed);
        self.notify_stream(index);

        let outcome = self.receive_response(self.config.command_timeout_ms);
        self.transport.enable_rx_interrupt(false);
        if let Err(e) = outcome {
            tracing::debug!("Stream {}: close reply: {}", index, e);
        }
        Ok(())
    }

    /// Interface fragment for the current association
    pub(crate) fn interface(&self) -> Result<&'static str> {
        match self.link.connection {
            ConnectionState::ConnectedAp => Ok(commands::IFACE_WLAN),
            ConnectionState::ConnectedSoftAp => Ok(commands::IFACE_SOFTAP),
            ConnectionState::Disconnected => Err(NetworkError::NoConnection.into()),
        }
    }

    /// Give the handle from a reply payload to slot `index`
    pub(crate) fn claim_handle(&mut self, index: usize, payload: &[u8]) -> Result<i8> {
        let parsed = match listing::parse_stream_handle(payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.streams.slot_mut(index)?.handle = -1;
                return Err(e.into());
            }
        };

        if let Some(stale) = self.streams.claim(index, parsed.handle) {
            tracing::warn!(
                "Handle {} reissued by module, releasing stream {}",
                parsed.handle,
                stale
            );
            self.notify_stream(stale);
        }
        Ok(parsed.handle)
    }
}
