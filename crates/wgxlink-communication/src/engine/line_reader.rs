//! Line-by-line reading of command output streams
//!
//! Listings (streams, files, scan results) come back as a module stream.
//! A small rolling buffer is refilled with bounded stream reads and split
//! on `\n`.

use super::Engine;
use crate::clock::Clock;
use crate::protocol::Command;
use crate::transport::Transport;
use wgxlink_core::{CommState, LinkError, Result, StreamError, StreamStatus, StreamType};

/// Rolling line buffer
#[derive(Debug)]
pub(crate) struct LineReader {
    buf: Vec<u8>,
    capacity: usize,
    /// Bytes of `buf` taken by the line returned last, newline included
    consumed: usize,
}

impl LineReader {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            consumed: 0,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.buf.clear();
        self.consumed = 0;
    }

    /// Drop the line returned last
    pub(crate) fn shift(&mut self) {
        self.buf.drain(..self.consumed.min(self.buf.len()));
        self.consumed = 0;
    }

    pub(crate) fn free(&self) -> usize {
        self.capacity.saturating_sub(self.buf.len())
    }

    pub(crate) fn append(&mut self, data: &[u8]) {
        let take = data.len().min(self.free());
        self.buf.extend_from_slice(&data[..take]);
    }

    /// Next line without its `\r\n`, or `None` when the buffer is empty.
    ///
    /// A full buffer with no newline is returned whole.
    pub(crate) fn next_line(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }

        let (end, consumed) = match self.buf.iter().position(|&b| b == b'\n') {
            Some(newline) => (newline, newline + 1),
            None => (self.buf.len(), self.buf.len()),
        };
        self.consumed = consumed;

        let line = &self.buf[..end];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        Some(String::from_utf8_lossy(line).into_owned())
    }
}

impl<T: Transport, C: Clock> Engine<T, C> {
    /// Read the next line of the listing open on slot `index`
    pub(crate) fn read_line(&mut self, index: usize) -> Result<Option<String>> {
        let slot = *self.streams.slot(index)?;
        if !slot.is_open() {
            return Err(StreamError::NotInitialized { stream: index }.into());
        }

        self.line_reader.shift();

        let free = self.line_reader.free().min(self.config.buffer_size);
        if free > 0 {
            match self.read_chunk(slot.handle, free) {
                Ok(data) => self.line_reader.append(&data),
                Err(e) if e.is_busy() => return Err(e),
                Err(e) => tracing::debug!("Stream {}: listing read failed: {}", index, e),
            }
        }

        Ok(self.line_reader.next_line())
    }

    /// Run a command whose reply is a listing handle and open it on `index`.
    ///
    /// The first `discard` rows (column headers) are skipped.
    pub(crate) fn open_listing(
        &mut self,
        index: usize,
        command: &Command,
        timeout_ms: u64,
        discard: usize,
    ) -> Result<()> {
        if self.streams.slot(index)?.is_open() {
            return Err(StreamError::AlreadyOpen { stream: index }.into());
        }

        if self.link.comm != CommState::Idle {
            return Err(LinkError::Busy.into());
        }

        self.streams.slot_mut(index)?.status = StreamStatus::Error;
        let response = self.execute_with_timeout(command, timeout_ms)?;

        self.streams.slot_mut(index)?.stream_type = StreamType::Command;
        self.claim_handle(index, &response.payload)?;

        self.line_reader.reset();
        for _ in 0..discard {
            self.read_line(index)?;
        }

        self.streams.slot_mut(index)?.status = StreamStatus::Ok;
        self.notify_stream(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_lines() {
        let mut reader = LineReader::new(32);
        reader.append(b"one\r\ntwo\r\nthr");

        assert_eq!(reader.next_line().as_deref(), Some("one"));
        reader.shift();
        assert_eq!(reader.next_line().as_deref(), Some("two"));
        reader.shift();
        assert_eq!(reader.free(), 29);
        reader.append(b"ee\r\n");
        assert_eq!(reader.next_line().as_deref(), Some("three"));
        reader.shift();
        assert_eq!(reader.next_line(), None);
    }

    #[test]
    fn test_full_buffer_without_newline() {
        let mut reader = LineReader::new(4);
        reader.append(b"abcdef");
        assert_eq!(reader.free(), 0);
        assert_eq!(reader.next_line().as_deref(), Some("abcd"));
        reader.shift();
        assert_eq!(reader.free(), 4);
    }

    #[test]
    fn test_empty_line() {
        let mut reader = LineReader::new(8);
        reader.append(b"\r\nx\r\n");
        assert_eq!(reader.next_line().as_deref(), Some(""));
        reader.shift();
        assert_eq!(reader.next_line().as_deref(), Some("x"));
    }
}
