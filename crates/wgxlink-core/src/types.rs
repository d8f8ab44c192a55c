//! Shared state types
//!
//! Stream tags and statuses, plus the three link-level state machines
//! (`CommState`, `ConnectionState`, `SetupState`) that the engine owns.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of logical stream multiplexed over the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamType {
    /// Unused slot
    #[default]
    None,
    /// Command output (listings, scans, info dumps)
    Command,
    /// File on the module's flash
    File,
    /// HTTP client request
    Http,
    /// TCP client connection
    TcpClient,
    /// Connection accepted by a TCP server
    TcpServer,
    /// TLS client connection
    TlsClient,
    /// Connection accepted by a TLS server
    TlsServer,
    /// UDP client socket
    UdpClient,
    /// UDP server socket
    UdpServer,
    /// Web server connection
    WebServer,
    /// Websocket client connection
    WebClient,
}

impl StreamType {
    /// Whether closing this stream must go over the wire asynchronously.
    ///
    /// Network-backed streams are closed by the background driver; command
    /// and file streams close with a synchronous exchange.
    pub fn requires_async_close(self) -> bool {
        !matches!(self, Self::None | Self::Command | Self::File)
    }

    /// Whether this stream is backed by a network peer
    pub fn is_network(self) -> bool {
        self.requires_async_close()
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Command => write!(f, "CMD"),
            Self::File => write!(f, "FILE"),
            Self::Http => write!(f, "HTTP"),
            Self::TcpClient => write!(f, "TCPC"),
            Self::TcpServer => write!(f, "TCPS"),
            Self::TlsClient => write!(f, "TLSC"),
            Self::TlsServer => write!(f, "TLSS"),
            Self::UdpClient => write!(f, "UDPC"),
            Self::UdpServer => write!(f, "UDPS"),
            Self::WebServer => write!(f, "WEBS"),
            Self::WebClient => write!(f, "WEBC"),
        }
    }
}

/// Lifecycle status of a stream slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamStatus {
    /// Open and usable (command/file streams)
    #[default]
    Ok,
    /// Client connect in flight
    Connecting,
    /// Network stream established
    Connected,
    /// Client connect was refused or timed out
    ConnectFailed,
    /// Close command in flight
    Closing,
    /// Close requested, waiting for the link to be free
    ClosePending,
    /// Closed; the slot is free
    Closed,
    /// Never opened
    NotInitialized,
    /// Last operation on the slot failed
    Error,
}

impl StreamStatus {
    /// Whether a background operation is still running for the slot
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Connecting | Self::Closing)
    }

    /// Whether the slot is closed or on its way to closed
    pub fn is_closing(self) -> bool {
        matches!(self, Self::ClosePending | Self::Closing | Self::Closed)
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::ConnectFailed => "connect-failed",
            Self::Closing => "closing",
            Self::ClosePending => "close-pending",
            Self::Closed => "closed",
            Self::NotInitialized => "not-initialized",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Transport protocol for client and server streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// UDP datagrams
    Udp,
    /// Plain TCP
    Tcp,
    /// TCP wrapped in TLS
    Tls,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Udp => write!(f, "udp"),
            Self::Tcp => write!(f, "tcp"),
            Self::Tls => write!(f, "tls"),
        }
    }
}

/// State of the physical link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommState {
    /// Engine not initialized yet
    #[default]
    Uninitialized,
    /// Ready for a new exchange
    Idle,
    /// Background receive waiting for the 9-byte header
    AwaitingHeader,
    /// Background receive waiting for the declared payload
    AwaitingData,
    /// Module told to sleep; waiting for it to answer a ping
    Sleeping,
}

impl fmt::Display for CommState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Idle => write!(f, "idle"),
            Self::AwaitingHeader => write!(f, "awaiting-header"),
            Self::AwaitingData => write!(f, "awaiting-data"),
            Self::Sleeping => write!(f, "sleeping"),
        }
    }
}

/// Network association of the module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    /// No interface up
    #[default]
    Disconnected,
    /// Joined (or joining) an access point
    ConnectedAp,
    /// Hosting a soft AP
    ConnectedSoftAp,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::ConnectedAp => write!(f, "connected-to-ap"),
            Self::ConnectedSoftAp => write!(f, "connected-soft-ap"),
        }
    }
}

/// Captive web setup progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SetupState {
    /// No setup flow running
    #[default]
    Idle,
    /// Portal is up, waiting for the user to pick a network
    WebSetupActive,
    /// Joining the network chosen through the portal
    ConnectingAfterSetup,
}

impl fmt::Display for SetupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::WebSetupActive => write!(f, "web-setup-active"),
            Self::ConnectingAfterSetup => write!(f, "connecting-after-setup"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_close_by_type() {
        assert!(!StreamType::None.requires_async_close());
        assert!(!StreamType::Command.requires_async_close());
        assert!(!StreamType::File.requires_async_close());
        assert!(StreamType::Http.requires_async_close());
        assert!(StreamType::TcpClient.requires_async_close());
        assert!(StreamType::UdpServer.requires_async_close());
        assert!(StreamType::WebClient.requires_async_close());
    }

    #[test]
    fn test_status_predicates() {
        assert!(StreamStatus::Connecting.is_busy());
        assert!(StreamStatus::Closing.is_busy());
        assert!(!StreamStatus::ClosePending.is_busy());
        assert!(StreamStatus::ClosePending.is_closing());
        assert!(!StreamStatus::Connected.is_closing());
    }

    #[test]
    fn test_display() {
        assert_eq!(StreamType::TlsServer.to_string(), "TLSS");
        assert_eq!(StreamStatus::ConnectFailed.to_string(), "connect-failed");
        assert_eq!(CommState::AwaitingData.to_string(), "awaiting-data");
        assert_eq!(SetupState::WebSetupActive.to_string(), "web-setup-active");
    }
}
