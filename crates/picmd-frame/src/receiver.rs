//! Incremental frame assembly.
//!
//! [`FrameReceiver`] accepts byte chunks of any size and yields validated
//! [`Command`]s. It moves through three states:
//! - `Searching`: no `AT*PIC=` prefix seen yet; everything stays buffered
//! - `HeaderPending`: prefix found, waiting for the id and length fields
//! - `BodyPending`: length known, waiting for payload, parity and terminator
//!
//! Malformed input never stalls the stream. A bad length field discards only
//! the header region, so a frame starting right after it is still found. A
//! complete frame is consumed before it is validated, so a bad terminator
//! costs exactly one frame.

use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use crate::codec::{decode_frame, decode_header, find, FrameConfig, COMMAND_PREFIX};
use crate::command::Command;
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Where the receiver is in assembling the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Scanning for a frame prefix.
    Searching,
    /// Prefix found at the start of the buffer; header not yet complete.
    HeaderPending,
    /// Header parsed; waiting for the rest of the frame.
    BodyPending { size: u16 },
}

/// Stateful stream-to-command decoder.
pub struct FrameReceiver {
    buf: BytesMut,
    state: ReceiverState,
    config: FrameConfig,
}

impl FrameReceiver {
    /// Create a receiver with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a receiver with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: ReceiverState::Searching,
            config,
        }
    }

    /// Append incoming bytes and advance the state machine.
    ///
    /// While no prefix has been seen the bytes are kept as-is; the buffer is
    /// not capped here. A malformed length field returns
    /// [`FrameError::Format`](crate::FrameError::Format) after the header
    /// region has been dropped and the state reset to `Searching`.
    pub fn store_buffer(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.buf.extend_from_slice(bytes);
        self.advance()
    }

    /// Take the next complete command out of the buffer, if there is one.
    ///
    /// Returns `Ok(None)` until the whole frame is buffered. Once it is, the
    /// frame's bytes are consumed and the receiver reset before the
    /// terminator and fields are checked: a
    /// [`FrameError::Length`](crate::FrameError::Length) or
    /// [`FrameError::Format`](crate::FrameError::Format) from this call
    /// cannot be retried. Bytes following the frame are scanned on the next
    /// call, so repeated calls drain every frame a single chunk carried.
    pub fn pull_received_command(&mut self) -> Result<Option<Command>> {
        self.advance()?;

        let ReceiverState::BodyPending { size } = self.state else {
            return Ok(None);
        };

        let frame_len = self.config.encoding.frame_len(size);
        if self.buf.len() < frame_len {
            return Ok(None);
        }

        let frame = self.buf.split_to(frame_len).freeze();
        self.state = ReceiverState::Searching;

        let command = decode_frame(&frame, size, self.config.encoding).inspect_err(|err| {
            warn!(error = %err, frame_len, "dropping malformed frame");
        })?;
        trace!(id = command.id, size = command.size, "frame received");
        Ok(Some(command))
    }

    fn advance(&mut self) -> Result<()> {
        if self.state == ReceiverState::Searching {
            let Some(start) = find(&self.buf, COMMAND_PREFIX) else {
                return Ok(());
            };
            if start > 0 {
                debug!(discarded = start, "discarding bytes before frame prefix");
                self.buf.advance(start);
            }
            self.state = ReceiverState::HeaderPending;
        }

        let header_len = self.config.encoding.header_len();
        if self.state == ReceiverState::HeaderPending && self.buf.len() >= header_len {
            match decode_header(&self.buf[..header_len], &self.config) {
                Ok(size) => self.state = ReceiverState::BodyPending { size },
                Err(err) => {
                    warn!(error = %err, "bad frame header; resynchronizing");
                    self.buf.advance(header_len);
                    self.state = ReceiverState::Searching;
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    /// Current assembly state.
    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Number of bytes currently buffered.
    pub fn buffered_size(&self) -> usize {
        self.buf.len()
    }

    /// Payload size declared by the pending frame's header, if parsed.
    pub fn pending_payload_size(&self) -> Option<u16> {
        match self.state {
            ReceiverState::BodyPending { size } => Some(size),
            _ => None,
        }
    }

    /// Drop all buffered bytes and start searching again.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.state = ReceiverState::Searching;
    }

    /// Drop unframed bytes while searching, keeping only a tail long enough
    /// to hold a partial prefix. Returns the number of bytes dropped.
    ///
    /// Once a prefix has been found the buffer is bounded by
    /// `max_payload_size`, so nothing is dropped outside `Searching`.
    pub fn discard_noise(&mut self) -> usize {
        if self.state != ReceiverState::Searching {
            return 0;
        }
        let keep = COMMAND_PREFIX.len() - 1;
        let dropped = self.buf.len().saturating_sub(keep);
        self.buf.advance(dropped);
        dropped
    }

    /// Current receiver configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for FrameReceiver {
    fn default() -> Self {
        Self::new()
    }
}
