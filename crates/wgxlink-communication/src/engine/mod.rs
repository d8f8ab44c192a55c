//! WGX link engine
//!
//! [`Engine`] owns the transport, the clock, the stream table and the link
//! state machines. Synchronous operations run one command/response exchange
//! at a time; client connects and network closes are handed to the
//! background driver, which the application advances by calling
//! [`Engine::poll`] at least once a second.

mod driver;
mod exchange;
mod files;
mod line_reader;
mod setup;
mod streams;
mod wifi;

pub use exchange::Response;
pub use streams::{StreamRead, StreamSlot, StreamTable};

use crate::clock::Clock;
use crate::protocol::{commands, Command, Header};
use crate::transport::Transport;
use line_reader::LineReader;
use exchange::RxBuffer;
use tokio::sync::broadcast;
use wgxlink_core::{
    CommState, ConnectionState, EngineConfig, EngineEvent, Error, EventDispatcher, LinkError,
    Result, SetupState,
};

/// Link-level state owned by the engine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkState {
    pub comm: CommState,
    pub connection: ConnectionState,
    pub setup: SetupState,
    /// Slot whose connect or close is waiting on the background receive
    pub active_async_stream: Option<usize>,
    /// Failed exchanges in a row; reset by any successful exchange
    pub consecutive_failures: u32,
}

/// What came back from a liveness ping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PingReply {
    Silent,
    HumanMode,
    MachineMode,
}

/// Communications engine for one WGX module
pub struct Engine<T: Transport, C: Clock> {
    transport: T,
    clock: C,
    config: EngineConfig,
    events: EventDispatcher,
    link: LinkState,
    streams: StreamTable,
    line_reader: LineReader,
    rx: RxBuffer,
    /// Header of the background receive once it has arrived
    async_header: Option<Header>,
    async_started_at: u64,
    setup_started_at: u64,
}

impl<T: Transport, C: Clock> Engine<T, C> {
    /// Create an engine; call [`Engine::initialize`] before anything else.
    pub fn new(transport: T, clock: C, config: EngineConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::other(format!("invalid engine config: {}", e)))?;

        Ok(Self {
            streams: StreamTable::new(config.max_streams),
            line_reader: LineReader::new(config.line_buffer_size),
            rx: RxBuffer::new(config.rx_capacity()),
            transport,
            clock,
            config,
            events: EventDispatcher::default(),
            link: LinkState::default(),
            async_header: None,
            async_started_at: 0,
            setup_started_at: 0,
        })
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current link state
    pub fn link_state(&self) -> &LinkState {
        &self.link
    }

    /// Failed exchanges in a row
    pub fn consecutive_failures(&self) -> u32 {
        self.link.consecutive_failures
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// The stream table
    pub fn streams(&self) -> &StreamTable {
        &self.streams
    }

    /// Name of the underlying transport
    pub fn transport_name(&self) -> String {
        self.transport.name()
    }

    /// Synchronize with the module and bring it up from a clean reboot.
    ///
    /// Every stream slot is reset, the module is switched to machine mode,
    /// rebooted and re-initialized.
    pub fn initialize(&mut self) -> Result<()> {
        tracing::info!("Initializing WGX link on {}", self.transport.name());

        self.streams.reset_all();
        self.link.comm = CommState::Idle;
        self.link.active_async_stream = None;

        self.wait_for_serial()?;
        self.set_machine_mode()?;
        self.reboot()
    }

    /// Whether an exchange or background operation owns the link.
    ///
    /// Advances the background driver first when the link is busy.
    pub fn is_busy(&mut self) -> bool {
        if self.link.comm != CommState::Idle {
            self.poll();
        }
        self.link.comm != CommState::Idle
    }

    /// Reboot the module and re-initialize the link.
    ///
    /// Waits for background work to finish first, for at most the network
    /// timeout.
    pub fn reboot(&mut self) -> Result<()> {
        let start = self.clock.now_ms();
        while self.link.comm != CommState::Uninitialized && self.is_busy() {
            if self.clock.elapsed_since(start) >= self.config.network_timeout_ms {
                tracing::warn!(
                    "Link still {} after {}ms, rebooting anyway",
                    self.link.comm,
                    self.config.network_timeout_ms
                );
                break;
            }
            std::hint::spin_loop();
        }

        self.reboot_now()
    }

    /// Put the module to sleep for `seconds`.
    ///
    /// Network interfaces are brought down first. The link reports busy
    /// until the module answers a ping again.
    pub fn sleep(&mut self, seconds: u16) -> Result<()> {
        if self.link.comm != CommState::Idle {
            return Err(LinkError::Busy.into());
        }

        self.set(
            commands::WAKEUP_TIMEOUT,
            &crate::protocol::format_number(seconds),
        )?;

        if let Err(e) = self.disconnect() {
            tracing::warn!("Disconnect before sleep failed: {}", e);
        }

        self.send_raw(&Command::new(commands::SLEEP))?;
        self.link.comm = CommState::Sleeping;
        self.events.publish(EngineEvent::Sleeping);
        tracing::info!("Module sleeping for {}s", seconds);
        Ok(())
    }

    /// Whether the module is still asleep; pings it if so
    pub fn is_sleeping(&mut self) -> bool {
        if self.link.comm == CommState::Sleeping {
            self.poll();
        }
        self.link.comm == CommState::Sleeping
    }

    fn reboot_now(&mut self) -> Result<()> {
        tracing::info!("Rebooting module");
        self.send_raw(&Command::new(commands::REBOOT))?;

        self.set_connection(ConnectionState::Disconnected);
        self.set_setup(SetupState::Idle);

        self.wait_for_serial()?;
        self.init_comms()
    }

    /// Send a liveness ping and classify the first four reply bytes
    pub(crate) fn ping(&mut self) -> Result<PingReply> {
        self.transport.clear_rx();
        self.transport.enable_rx_interrupt(true);

        let start = self.clock.now_ms();
        self.transport.write(crate::protocol::codec::LINE_END)?;

        let mut reply = [0u8; 4];
        let mut filled = 0;
        while filled < reply.len()
            && self.clock.elapsed_since(start) < self.config.ping_timeout_ms
        {
            filled += self.transport.read_into(&mut reply[filled..]);
        }

        if filled < reply.len() {
            self.transport.enable_rx_interrupt(false);
            return Ok(PingReply::Silent);
        }

        // let the rest of the reply drain before the next command
        self.clock.wait_ms(2);
        self.transport.enable_rx_interrupt(false);
        self.transport.clear_rx();

        match &reply {
            b"\r\nRe" => Ok(PingReply::HumanMode),
            b"R000" => Ok(PingReply::MachineMode),
            _ => {
                tracing::debug!("Unexpected ping reply {:?}", String::from_utf8_lossy(&reply));
                self.clock.wait_ms(20);
                Ok(PingReply::Silent)
            }
        }
    }

    /// Ping until the module answers, giving up after `sync_attempts`
    pub(crate) fn wait_for_serial(&mut self) -> Result<PingReply> {
        for _ in 0..self.config.sync_attempts {
            match self.ping()? {
                PingReply::Silent => continue,
                reply => return Ok(reply),
            }
        }

        tracing::warn!(
            "Module silent after {} pings",
            self.config.sync_attempts
        );
        Err(LinkError::NoSync {
            attempts: self.config.sync_attempts,
        }
        .into())
    }

    fn set_machine_mode(&mut self) -> Result<()> {
        let cmd = Command::new(commands::SET).arg(commands::MACHINE_MODE);

        self.send_raw(&cmd)?;
        self.clock.wait_ms(10);

        if self.wait_for_serial()? != PingReply::MachineMode {
            tracing::debug!("Module still in human mode, retrying");
            self.send_raw(&cmd)?;
            self.clock.wait_ms(10);
            self.wait_for_serial()?;
        }
        Ok(())
    }

    /// Put the module's command interface into the state the engine expects
    pub(crate) fn init_comms(&mut self) -> Result<()> {
        self.link.comm = CommState::Idle;
        self.link.consecutive_failures = 0;

        self.set_machine_mode()?;

        let setup = [
            Command::new(commands::SET)
                .arg(commands::STREAM_BUFFERED)
                .arg(commands::TRUE),
            Command::new(commands::SET)
                .arg(commands::STREAM_AUTO_CLOSE)
                .arg(commands::FALSE),
            Command::new(commands::SET)
                .arg(commands::SOFTAP_DNS_ENABLED)
                .arg(commands::FALSE),
            Command::new(commands::CLOSE_ALL),
            Command::new(commands::NETWORK_DOWN).arg(commands::IFACE_WLAN),
            Command::new(commands::NETWORK_DOWN).arg(commands::IFACE_SOFTAP),
        ];
        for cmd in &setup {
            if let Err(e) = self.execute(cmd) {
                tracing::warn!("Link setup command '{}' failed: {}", cmd, e);
            }
        }

        self.link.active_async_stream = None;
        self.events.publish(EngineEvent::LinkSynchronized);
        tracing::info!("WGX link synchronized");
        Ok(())
    }

    fn set_connection(&mut self, state: ConnectionState) {
        if self.link.connection != state {
            tracing::info!("Connection {} -> {}", self.link.connection, state);
            self.link.connection = state;
            self.events.publish(EngineEvent::ConnectionChanged(state));
        }
    }

    fn set_setup(&mut self, state: SetupState) {
        if self.link.setup != state {
            tracing::info!("Setup {} -> {}", self.link.setup, state);
            self.link.setup = state;
            self.events.publish(EngineEvent::SetupChanged(state));
        }
    }

    fn notify_stream(&self, index: usize) {
        if let Ok(slot) = self.streams.slot(index) {
            self.events.publish(EngineEvent::StreamStatusChanged {
                stream: index,
                status: slot.status,
                handle: slot.handle,
            });
        }
    }
}
