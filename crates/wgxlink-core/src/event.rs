//! Event system for the link engine
//!
//! Provides:
//! - Event types for stream, association and link state changes
//! - Event dispatcher for publishing events to subscribers

use crate::types::{ConnectionState, SetupState, StreamStatus};
use tokio::sync::broadcast;

/// Engine event types
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Link re-synchronized with the module (after init, reboot or wake)
    LinkSynchronized,
    /// A stream slot changed status
    StreamStatusChanged {
        /// Stream table index.
        stream: usize,
        /// New status.
        status: StreamStatus,
        /// Module handle after the change (`-1` when free).
        handle: i8,
    },
    /// Network association changed
    ConnectionChanged(ConnectionState),
    /// Web setup flow changed state
    SetupChanged(SetupState),
    /// Module was put to sleep
    Sleeping,
    /// An exchange failed at the link level
    ExchangeFailed {
        /// Failures in a row, including this one.
        consecutive_failures: u32,
    },
}

impl std::fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineEvent::LinkSynchronized => write!(f, "Link synchronized"),
            EngineEvent::StreamStatusChanged {
                stream,
                status,
                handle,
            } => write!(f, "Stream {}: {} (handle {})", stream, status, handle),
            EngineEvent::ConnectionChanged(state) => write!(f, "Connection: {}", state),
            EngineEvent::SetupChanged(state) => write!(f, "Setup: {}", state),
            EngineEvent::Sleeping => write!(f, "Module sleeping"),
            EngineEvent::ExchangeFailed {
                consecutive_failures,
            } => write!(f, "Exchange failed ({} in a row)", consecutive_failures),
        }
    }
}

/// Event dispatcher for publishing events to subscribers
#[derive(Clone)]
pub struct EventDispatcher {
    /// Broadcast sender channel for engine events.
    tx: broadcast::Sender<EngineEvent>,
}

impl EventDispatcher {
    /// Create a new event dispatcher
    ///
    /// # Arguments
    /// * `buffer_size` - Size of the broadcast buffer (default 64)
    pub fn new(buffer_size: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer_size.max(1));
        Self { tx }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to all subscribers.
    ///
    /// Events published with no subscriber are dropped.
    pub fn publish(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("engine event dropped, no subscribers");
        }
    }

    /// Get number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let dispatcher = EventDispatcher::default();
        dispatcher.publish(EngineEvent::Sleeping);
        assert_eq!(dispatcher.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_receives_event() {
        let dispatcher = EventDispatcher::new(8);
        let mut rx = dispatcher.subscribe();
        dispatcher.publish(EngineEvent::StreamStatusChanged {
            stream: 1,
            status: StreamStatus::Connected,
            handle: 3,
        });

        let event = rx.try_recv().unwrap();
        assert_eq!(event.to_string(), "Stream 1: connected (handle 3)");
    }
}
