//! Wi-Fi association, scanning and HTTP requests

use super::Engine;
use crate::clock::Clock;
use crate::protocol::{commands, listing, Command, ScanEntry};
use crate::transport::Transport;
use wgxlink_core::{
    CommState, ConnectionState, LinkError, NetworkError, Result, SetupState, StreamError,
    StreamStatus, StreamType,
};

impl<T: Transport, C: Clock> Engine<T, C> {
    /// Whether the module has a usable network.
    ///
    /// In station mode this asks the module for the WLAN status; a soft AP
    /// counts as connected once started. Never true while web setup runs.
    pub fn is_connected(&mut self) -> bool {
        if self.link.setup != SetupState::Idle {
            return false;
        }

        match self.link.connection {
            ConnectionState::ConnectedAp => self
                .get(commands::WLAN_STATUS, 1)
                .map(|status| status.starts_with(commands::WLAN_STATUS_UP))
                .unwrap_or(false),
            ConnectionState::ConnectedSoftAp => true,
            ConnectionState::Disconnected => false,
        }
    }

    /// Join an access point.
    ///
    /// Credentials are stored on the module when given; otherwise the
    /// saved ones are used. Returns once the interface is asked to come up;
    /// poll [`Engine::is_connected`] for the result.
    pub fn connect(&mut self, ssid: Option<&str>, pass: Option<&str>) -> Result<()> {
        if self.link.setup != SetupState::Idle {
            return Err(NetworkError::SetupActive.into());
        }

        if let Err(e) = self.disconnect() {
            tracing::warn!("Disconnect before connect failed: {}", e);
        }

        if let Some(ssid) = ssid {
            self.set(commands::WLAN_SSID, ssid)?;
        }
        if let Some(pass) = pass {
            self.set(commands::WLAN_PASS, pass)?;
        }

        self.set_connection(ConnectionState::ConnectedAp);
        self.execute(&Command::new(commands::NETWORK_UP).arg(commands::IFACE_WLAN))
            .map(|_| ())
    }

    /// Start a soft access point
    pub fn start_soft_ap(&mut self, ssid: &str, pass: &str) -> Result<()> {
        if self.link.setup != SetupState::Idle {
            return Err(NetworkError::SetupActive.into());
        }

        if let Err(e) = self.disconnect() {
            tracing::warn!("Disconnect before soft AP failed: {}", e);
        }

        self.set(commands::SOFTAP_SSID, ssid)?;
        self.set(commands::SOFTAP_PASS, pass)?;

        self.set_connection(ConnectionState::ConnectedSoftAp);
        self.execute(&Command::new(commands::NETWORK_UP).arg(commands::IFACE_SOFTAP))
            .map(|_| ())
    }

    /// Bring the active interface down and release every network stream
    pub fn disconnect(&mut self) -> Result<()> {
        if self.link.setup != SetupState::Idle {
            return Err(NetworkError::SetupActive.into());
        }

        let outcome = match self.link.connection {
            ConnectionState::ConnectedAp => self
                .execute(&Command::new(commands::NETWORK_DOWN).arg(commands::IFACE_WLAN))
                .map(|_| ()),
            ConnectionState::ConnectedSoftAp => self
                .execute(&Command::new(commands::NETWORK_DOWN).arg(commands::IFACE_SOFTAP))
                .map(|_| ()),
            ConnectionState::Disconnected => Ok(()),
        };

        self.set_connection(ConnectionState::Disconnected);

        for index in self
            .streams
            .release_where(|slot| slot.stream_type.requires_async_close())
        {
            self.notify_stream(index);
        }

        outcome
    }

    /// Number of stations joined to the soft AP
    pub fn soft_ap_client_count(&mut self) -> Result<u8> {
        let response = self.execute(&Command::new(commands::GET).arg(commands::SOFTAP_INFO))?;
        let handle = listing::parse_stream_handle(&response.payload)?.handle;

        let dump = self.read_chunk(handle, self.config.buffer_size);
        let closed = self.execute(&Command::new(commands::CLOSE).handle(handle));

        let count = listing::parse_client_count(&dump?);
        closed?;
        Ok(count)
    }

    /// IP address of the active interface
    pub fn ip_address(&mut self) -> Result<String> {
        let variable = match self.link.connection {
            ConnectionState::ConnectedAp => commands::WLAN_IP,
            ConnectionState::ConnectedSoftAp => commands::SOFTAP_IP,
            ConnectionState::Disconnected => return Err(NetworkError::NoConnection.into()),
        };
        self.get(variable, self.config.buffer_size)
    }

    /// SSID of the joined network or of the soft AP
    pub fn ssid(&mut self) -> Result<String> {
        let variable = match self.link.connection {
            ConnectionState::ConnectedAp => commands::WLAN_SSID,
            ConnectionState::ConnectedSoftAp => commands::SOFTAP_SSID,
            ConnectionState::Disconnected => return Err(NetworkError::NoConnection.into()),
        };
        self.get(variable, self.config.buffer_size)
    }

    /// Signal strength of the joined network in dBm
    pub fn rssi(&mut self) -> Result<i8> {
        let response = self.execute(&Command::new(commands::RSSI))?;
        let value = listing::atoi(&response.payload);
        Ok(i8::try_from(value).unwrap_or(if value < 0 { i8::MIN } else { i8::MAX }))
    }

    /// Scan for networks and open the results on slot `index`; read them
    /// with [`Engine::read_scan_entry`]
    pub fn scan_wifi(&mut self, index: usize) -> Result<()> {
        self.open_listing(
            index,
            &Command::new(commands::SCAN),
            self.config.network_timeout_ms,
            2,
        )
    }

    /// Next scan result, `None` once the results are exhausted
    pub fn read_scan_entry(&mut self, index: usize) -> Result<Option<ScanEntry>> {
        if !self.streams.slot(index)?.is_open() {
            return Err(StreamError::NotInitialized { stream: index }.into());
        }
        if self.link.comm != CommState::Idle {
            return Err(LinkError::Busy.into());
        }

        match self.read_line(index)? {
            Some(line) => Ok(listing::parse_scan_row(&line)?),
            None => Ok(None),
        }
    }

    /// Start an HTTP GET; the response body is read from slot `index`
    pub fn http_get(&mut self, index: usize, url: &str) -> Result<()> {
        self.streams.slot(index)?;
        let iface = self.interface()?;
        self.open_http(index, &Command::new(commands::HTTP_GET).arg(iface).arg(url))
    }

    /// Start an HTTP POST; write the body to slot `index`, then read the
    /// response from it
    pub fn http_post(&mut self, index: usize, url: &str, content_type: &str) -> Result<()> {
        self.streams.slot(index)?;
        let iface = self.interface()?;
        self.open_http(
            index,
            &Command::new(commands::HTTP_POST)
                .arg(iface)
                .arg(url)
                .arg(format!(" {}", content_type)),
        )
    }

    fn open_http(&mut self, index: usize, command: &Command) -> Result<()> {
        if self.streams.slot(index)?.is_open() {
            return Err(StreamError::AlreadyOpen { stream: index }.into());
        }

        if self.link.comm != CommState::Idle {
            return Err(LinkError::Busy.into());
        }

        self.streams.slot_mut(index)?.status = StreamStatus::Error;
        let response = self.execute(command)?;

        self.streams.slot_mut(index)?.stream_type = StreamType::Http;
        self.claim_handle(index, &response.payload)?;
        self.streams.slot_mut(index)?.status = StreamStatus::Ok;
        self.notify_stream(index);
        Ok(())
    }
}
