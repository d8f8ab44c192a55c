//! Error handling for the WGX link
//!
//! Errors are grouped by the layer that raises them:
//! - Link errors (framing, timeouts, module rejections, busy link)
//! - Stream errors (caller misuse of the stream table)
//! - Network errors (operations that need an association)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Link error type
///
/// Raised by the wire codec and the command/response exchange.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Another exchange or background operation owns the link
    #[error("Link busy: an exchange is already in flight")]
    Busy,

    /// No complete response arrived in time
    #[error("Response timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout budget in milliseconds.
        timeout_ms: u64,
    },

    /// Response header was malformed
    #[error("Protocol error: {reason}")]
    Protocol {
        /// What was wrong with the response.
        reason: String,
    },

    /// The module answered with a non-zero error digit
    #[error("Command rejected by module (code {code})")]
    CommandRejected {
        /// Error digit from the response header.
        code: u8,
    },

    /// Outgoing command does not fit the transmit buffer
    #[error("Framing error: {reason}")]
    Framing {
        /// Why the command could not be framed.
        reason: String,
    },

    /// The module never answered the liveness probe
    #[error("Module did not respond after {attempts} sync attempts")]
    NoSync {
        /// Number of pings sent.
        attempts: u32,
    },

    /// The byte transport failed
    #[error("Transport error: {reason}")]
    Transport {
        /// The underlying failure.
        reason: String,
    },
}

/// Stream error type
///
/// Represents misuse of the stream table by the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The slot already holds an open handle
    #[error("Stream {stream} is already open")]
    AlreadyOpen {
        /// Stream table index.
        stream: usize,
    },

    /// The slot has no handle
    #[error("Stream {stream} is not initialized")]
    NotInitialized {
        /// Stream table index.
        stream: usize,
    },

    /// Index outside the stream table
    #[error("Invalid stream {index} (table holds {capacity})")]
    InvalidStream {
        /// Requested index.
        index: usize,
        /// Table capacity.
        capacity: usize,
    },

    /// Protocol not valid for the requested operation
    #[error("Protocol {protocol} not supported for {operation}")]
    UnsupportedProtocol {
        /// Protocol name.
        protocol: String,
        /// Operation name.
        operation: String,
    },

    /// Reply payload did not carry a usable stream handle
    #[error("Malformed stream reply: {reason}")]
    MalformedReply {
        /// What was wrong.
        reason: String,
    },

    /// A background operation did not finish in time
    #[error("Stream {stream} still busy after {timeout_ms}ms")]
    WaitTimeout {
        /// Stream table index.
        stream: usize,
        /// The wait budget in milliseconds.
        timeout_ms: u64,
    },
}

/// Network error type
///
/// Raised by operations that depend on the module's network association.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NetworkError {
    /// No access point or soft AP is up
    #[error("No network connection")]
    NoConnection,

    /// The captive web setup flow owns the radio
    #[error("Web setup in progress")]
    SetupActive,
}

/// Main error type for the WGX link
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs.
#[derive(Error, Debug)]
pub enum Error {
    /// Link error
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Stream error
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Network error
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if the link or the radio was busy; the caller may retry later
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Error::Link(LinkError::Busy) | Error::Network(NetworkError::SetupActive)
        )
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Link(LinkError::Timeout { .. })
                | Error::Stream(StreamError::WaitTimeout { .. })
        )
    }

    /// Check if the module rejected the command
    pub fn rejection_code(&self) -> Option<u8> {
        match self {
            Error::Link(LinkError::CommandRejected { code }) => Some(*code),
            _ => None,
        }
    }

    /// Check if this is a link-level failure that counts against the link
    pub fn is_link_failure(&self) -> bool {
        matches!(
            self,
            Error::Link(
                LinkError::Timeout { .. }
                    | LinkError::Protocol { .. }
                    | LinkError::CommandRejected { .. }
            )
        )
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err: Error = LinkError::Timeout { timeout_ms: 1000 }.into();
        assert_eq!(err.to_string(), "Response timed out after 1000ms");

        let err: Error = StreamError::InvalidStream {
            index: 7,
            capacity: 4,
        }
        .into();
        assert_eq!(err.to_string(), "Invalid stream 7 (table holds 4)");

        let err: Error = NetworkError::NoConnection.into();
        assert_eq!(err.to_string(), "No network connection");
    }

    #[test]
    fn test_classification() {
        let busy: Error = LinkError::Busy.into();
        assert!(busy.is_busy());
        assert!(!busy.is_link_failure());

        let setup: Error = NetworkError::SetupActive.into();
        assert!(setup.is_busy());

        let rejected: Error = LinkError::CommandRejected { code: 6 }.into();
        assert_eq!(rejected.rejection_code(), Some(6));
        assert!(rejected.is_link_failure());

        let wait: Error = StreamError::WaitTimeout {
            stream: 0,
            timeout_ms: 50,
        }
        .into();
        assert!(wait.is_timeout());
        assert_eq!(wait.rejection_code(), None);
    }
}
