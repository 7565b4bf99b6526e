//! `tokio_util::codec` adapter for async device loops.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_response, FrameConfig};
use crate::command::{Command, Response};
use crate::error::{FrameError, Result};
use crate::receiver::FrameReceiver;

/// Decodes request frames and encodes replies.
///
/// Each decoded item is itself a `Result` so a malformed frame surfaces as
/// one `Err` item while the stream keeps going, matching the resynchronizing
/// behavior of [`FrameReceiver`].
pub struct CommandCodec {
    receiver: FrameReceiver,
}

impl CommandCodec {
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            receiver: FrameReceiver::with_config(config),
        }
    }
}

impl Default for CommandCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for CommandCodec {
    type Item = Result<Command>;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if !src.is_empty() {
            let chunk = src.split();
            if let Err(err) = self.receiver.store_buffer(&chunk) {
                return Ok(Some(Err(err)));
            }
        }

        match self.receiver.pull_received_command() {
            Ok(Some(command)) => Ok(Some(Ok(command))),
            Ok(None) => Ok(None),
            Err(err) => Ok(Some(Err(err))),
        }
    }
}

impl Encoder<(u8, Response)> for CommandCodec {
    type Error = FrameError;

    fn encode(&mut self, (id, response): (u8, Response), dst: &mut BytesMut) -> Result<()> {
        encode_response(id, &response, self.receiver.config().encoding, dst)
    }
}
