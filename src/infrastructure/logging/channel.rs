//! Scenario log channel.
//!
//! An append-only byte buffer shared between the tracing layer that writes
//! scenario records and the report aggregator that reads them. It is opened
//! at suite start and drained exactly once; after the drain the channel is
//! closed and further writes are discarded.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Log channel already drained")]
    AlreadyDrained,
}

#[derive(Debug)]
enum ChannelState {
    Open(Vec<u8>),
    Closed,
}

#[derive(Debug, Clone)]
pub struct LogChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl LogChannel {
    pub fn open() -> Self {
        Self {
            state: Arc::new(Mutex::new(ChannelState::Open(Vec::new()))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Append raw bytes. A no-op once the channel is closed.
    pub fn append(&self, bytes: &[u8]) {
        if let ChannelState::Open(buf) = &mut *self.lock() {
            buf.extend_from_slice(bytes);
        }
    }

    /// Take everything written so far and close the channel.
    pub fn drain(&self) -> Result<Vec<u8>, ChannelError> {
        match std::mem::replace(&mut *self.lock(), ChannelState::Closed) {
            ChannelState::Open(buf) => Ok(buf),
            ChannelState::Closed => Err(ChannelError::AlreadyDrained),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.lock(), ChannelState::Open(_))
    }
}

/// Writer handed out per event by [`LogChannel`].
pub struct ChannelWriter {
    channel: LogChannel,
}

impl io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.channel.append(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogChannel {
    type Writer = ChannelWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ChannelWriter {
            channel: self.clone(),
        }
    }
}
