//! Files on the module's flash

use super::Engine;
use crate::clock::Clock;
use crate::protocol::{commands, listing, Command, FileEntry};
use crate::transport::Transport;
use wgxlink_core::{CommState, LinkError, Result, StreamError, StreamStatus, StreamType};

impl<T: Transport, C: Clock> Engine<T, C> {
    /// Open an existing file for reading on slot `index`
    pub fn open_file(&mut self, index: usize, filename: &str) -> Result<()> {
        self.open_file_stream(index, &Command::new(commands::FILE_OPEN).arg(filename))
    }

    /// Create (or overwrite) a file of `size` bytes and open it for writing
    pub fn create_file(&mut self, index: usize, filename: &str, size: u16) -> Result<()> {
        self.open_file_stream(
            index,
            &Command::new(commands::FILE_CREATE).arg(filename).number(size),
        )
    }

    /// Open the file listing on slot `index`; read it with
    /// [`Engine::read_file_list_entry`]
    pub fn list_files(&mut self, index: usize) -> Result<()> {
        self.open_listing(
            index,
            &Command::new(commands::FILE_LIST),
            self.config.command_timeout_ms,
            1,
        )
    }

    /// Next file of the listing, `None` once the listing is exhausted
    pub fn read_file_list_entry(&mut self, index: usize) -> Result<Option<FileEntry>> {
        if !self.streams.slot(index)?.is_open() {
            return Err(StreamError::NotInitialized { stream: index }.into());
        }
        if self.link.comm != CommState::Idle {
            return Err(LinkError::Busy.into());
        }

        match self.read_line(index)? {
            Some(line) => Ok(listing::parse_file_row(&line)?),
            None => Ok(None),
        }
    }

    fn open_file_stream(&mut self, index: usize, command: &Command) -> Result<()> {
        if self.streams.slot(index)?.is_open() {
            return Err(StreamError::AlreadyOpen { stream: index }.into());
        }

        if self.link.comm != CommState::Idle {
            return Err(LinkError::Busy.into());
        }

        self.streams.slot_mut(index)?.status = StreamStatus::Error;
        let response = self.execute(command)?;

        self.streams.slot_mut(index)?.stream_type = StreamType::File;
        let handle = self.claim_handle(index, &response.payload)?;

        self.streams.slot_mut(index)?.status = StreamStatus::Ok;
        self.notify_stream(index);
        tracing::debug!("Stream {}: '{}' opened as handle {}", index, command, handle);
        Ok(())
    }
}
