//! In-memory module double
//!
//! [`ScriptedTransport`] answers every command line the engine writes with a
//! machine-mode reply taken from a script. The paired [`ScriptedModule`]
//! handle lets the caller queue replies, install standing answers for
//! command prefixes, push bytes at any time and inspect what was sent.

use super::{RxRing, Transport};
use crate::protocol::codec;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use wgxlink_core::Result;

const RX_RING_CAPACITY: usize = 4096;

#[derive(Debug, Clone)]
enum Scripted {
    Reply(Vec<u8>),
    Silent,
}

#[derive(Debug)]
struct ScriptState {
    partial: Vec<u8>,
    sent: Vec<String>,
    queue: VecDeque<Scripted>,
    standing: Vec<(String, Vec<u8>)>,
    ping_reply: Option<Vec<u8>>,
    auto_ack: bool,
}

impl ScriptState {
    fn answer(&mut self, line: &str) -> Option<Vec<u8>> {
        if line.is_empty() {
            return self.ping_reply.clone();
        }

        if let Some((_, reply)) = self
            .standing
            .iter()
            .rev()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
        {
            return Some(reply.clone());
        }

        match self.queue.pop_front() {
            Some(Scripted::Reply(bytes)) => Some(bytes),
            Some(Scripted::Silent) => None,
            None if self.auto_ack => Some(frame(0, "")),
            None => None,
        }
    }
}

/// Frame a machine-mode reply: header, body and the body's trailing CRLF.
///
/// An empty body is sent without CRLF, matching an empty stream read.
pub fn frame(code: u8, body: &str) -> Vec<u8> {
    let mut payload = body.as_bytes().to_vec();
    if !payload.is_empty() {
        payload.extend_from_slice(b"\r\n");
    }
    let mut bytes = codec::encode_header(code, payload.len()).to_vec();
    bytes.extend_from_slice(&payload);
    bytes
}

/// Transport half of the module double
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
    rx: Arc<RxRing>,
}

/// Control half of the module double
#[derive(Clone)]
pub struct ScriptedModule {
    state: Arc<Mutex<ScriptState>>,
    rx: Arc<RxRing>,
}

impl ScriptedTransport {
    /// Create a transport and its control handle.
    ///
    /// Pings are answered and unscripted commands are acknowledged with an
    /// empty success reply until told otherwise.
    pub fn new() -> (Self, ScriptedModule) {
        let state = Arc::new(Mutex::new(ScriptState {
            partial: Vec::new(),
            sent: Vec::new(),
            queue: VecDeque::new(),
            standing: Vec::new(),
            ping_reply: Some(frame(0, "")),
            auto_ack: true,
        }));
        let rx = Arc::new(RxRing::new(RX_RING_CAPACITY));
        (
            Self {
                state: state.clone(),
                rx: rx.clone(),
            },
            ScriptedModule { state, rx },
        )
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock();
        for &byte in data {
            if byte != b'\n' {
                state.partial.push(byte);
                continue;
            }

            let mut line = std::mem::take(&mut state.partial);
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line).into_owned();
            let reply = state.answer(&line);
            state.sent.push(line);
            if let Some(reply) = reply {
                self.rx.push(&reply);
            }
        }
        Ok(())
    }

    fn tx_fifo_depth(&self) -> usize {
        0
    }

    fn read_into(&mut self, buf: &mut [u8]) -> usize {
        self.rx.pop_into(buf)
    }

    fn rx_pending(&self) -> usize {
        self.rx.len()
    }

    fn clear_rx(&mut self) {
        self.rx.clear();
    }

    fn enable_rx_interrupt(&mut self, enabled: bool) {
        self.rx.set_enabled(enabled);
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}

impl ScriptedModule {
    /// Queue a reply for the next unmatched command
    pub fn reply(&self, code: u8, body: &str) -> &Self {
        self.state
            .lock()
            .queue
            .push_back(Scripted::Reply(frame(code, body)));
        self
    }

    /// Queue raw bytes as the reply to the next unmatched command
    pub fn reply_raw(&self, bytes: &[u8]) -> &Self {
        self.state
            .lock()
            .queue
            .push_back(Scripted::Reply(bytes.to_vec()));
        self
    }

    /// Leave the next unmatched command unanswered
    pub fn silence(&self) -> &Self {
        self.state.lock().queue.push_back(Scripted::Silent);
        self
    }

    /// Always answer commands starting with `prefix` with this reply
    pub fn respond_to(&self, prefix: &str, code: u8, body: &str) -> &Self {
        let mut state = self.state.lock();
        state.standing.retain(|(p, _)| p != prefix);
        state.standing.push((prefix.to_string(), frame(code, body)));
        self
    }

    /// Remove a standing answer
    pub fn forget(&self, prefix: &str) -> &Self {
        self.state.lock().standing.retain(|(p, _)| p != prefix);
        self
    }

    /// Push bytes as if they had just arrived on the wire
    pub fn deliver(&self, bytes: &[u8]) -> usize {
        self.rx.push(bytes)
    }

    /// Answer pings (empty lines) with a machine-mode reply, or not at all
    pub fn set_answer_pings(&self, enabled: bool) -> &Self {
        self.state.lock().ping_reply = enabled.then(|| frame(0, ""));
        self
    }

    /// Answer pings with these bytes
    pub fn set_ping_reply(&self, bytes: &[u8]) -> &Self {
        self.state.lock().ping_reply = Some(bytes.to_vec());
        self
    }

    /// Acknowledge unscripted commands with an empty success reply
    pub fn set_auto_ack(&self, enabled: bool) -> &Self {
        self.state.lock().auto_ack = enabled;
        self
    }

    /// Every line written so far, without its line ending
    pub fn sent(&self) -> Vec<String> {
        self.state.lock().sent.clone()
    }

    /// Lines written so far that are not pings
    pub fn commands(&self) -> Vec<String> {
        self.state
            .lock()
            .sent
            .iter()
            .filter(|line| !line.is_empty())
            .cloned()
            .collect()
    }

    /// Forget the sent-line history
    pub fn clear_sent(&self) {
        self.state.lock().sent.clear();
    }

    /// Queued replies not yet consumed
    pub fn pending_replies(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether the receive side is currently enabled
    pub fn rx_enabled(&self) -> bool {
        self.rx.is_enabled()
    }
}
