use std::time::{Duration, Instant};

use bytes::BytesMut;
use picmd_transport::{is_idle, Transport};
use tracing::debug;

use crate::codec::{decode_reply, encode_command, FrameConfig, ReplyFrame};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 1024;

/// Default time to wait for a reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// Host side of the link: sends command frames and reads back replies.
///
/// Handles partial reads internally; callers always get complete replies.
pub struct CommandClient<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
    reply_timeout: Duration,
}

impl<T: Transport> CommandClient<T> {
    /// Create a client with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a client with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    /// Override how long [`read_reply`](Self::read_reply) waits.
    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    /// Encode and send a command frame.
    pub fn send(&mut self, id: u8, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        let mut frame = BytesMut::new();
        encode_command(id, payload, self.config.encoding, &mut frame)?;
        debug!(id, size = payload.len(), "sending command");
        self.inner.write(&frame)?;
        Ok(())
    }

    /// Read the next complete reply (blocking up to the reply timeout).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_reply(&mut self) -> Result<ReplyFrame> {
        let deadline = Instant::now() + self.reply_timeout;
        loop {
            if let Some(reply) = decode_reply(&mut self.buf, self.config.encoding)? {
                return Ok(reply);
            }

            if Instant::now() >= deadline {
                return Err(FrameError::Timeout(self.reply_timeout));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if is_idle(&err) => continue,
                Err(err) => return Err(FrameError::Transport(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Send a command and wait for its reply.
    pub fn request(&mut self, id: u8, payload: &[u8]) -> Result<ReplyFrame> {
        self.send(id, payload)?;
        self.read_reply()
    }

    /// Borrow the underlying transport.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying transport.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the client and return the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current client configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use picmd_transport::MemoryTransport;

    use super::*;
    use crate::codec::{encode_response, FieldEncoding};
    use crate::command::Response;
    use crate::status::NO_ERROR;

    #[test]
    fn send_writes_command_frame() {
        let (transport, handle) = MemoryTransport::pair();
        let mut client = CommandClient::new(transport);

        client.send(0x01, b"\x02").unwrap();
        assert_eq!(handle.written(), b"AT*PIC=\x01\x01\x00\x02\x02\r\n");
    }

    #[test]
    fn reads_reply_split_across_chunks() {
        let mut wire = BytesMut::new();
        encode_response(
            0x01,
            &Response::ok(&b"\x03\x00\x00\x00\x00\x00\x00\x00"[..]),
            FieldEncoding::Binary,
            &mut wire,
        )
        .unwrap();
        let (head, tail) = wire.split_at(6);
        let (transport, _handle) = MemoryTransport::scripted([head.to_vec(), tail.to_vec()]);

        let mut client = CommandClient::new(transport);
        let reply = client.read_reply().unwrap();

        assert_eq!(reply.id, 0x01);
        assert_eq!(reply.status, NO_ERROR);
        assert_eq!(reply.checksum, 0x0a);
    }

    #[test]
    fn closed_link_before_reply() {
        let (transport, handle) = MemoryTransport::scripted([&b"*PIC:\x01"[..]]);
        handle.close();

        let mut client = CommandClient::new(transport);
        assert!(matches!(
            client.read_reply(),
            Err(FrameError::ConnectionClosed)
        ));
    }

    #[test]
    fn silent_link_times_out() {
        let (transport, _handle) = MemoryTransport::pair();
        let transport = transport.with_poll_interval(Duration::from_millis(5));
        let mut client =
            CommandClient::new(transport).with_reply_timeout(Duration::from_millis(20));

        assert!(matches!(client.read_reply(), Err(FrameError::Timeout(_))));
    }

    #[test]
    fn oversized_payload_rejected() {
        let (transport, handle) = MemoryTransport::pair();
        let config = FrameConfig {
            max_payload_size: 2,
            ..FrameConfig::default()
        };
        let mut client = CommandClient::with_config(transport, config);

        let err = client.send(0x01, b"abc").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(handle.written().is_empty());
    }
}
