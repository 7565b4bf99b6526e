//! AT-style command framing for picmd.
//!
//! Every request travels as one line-terminated frame:
//! - The literal prefix `AT*PIC=` for stream synchronization
//! - A 1-byte command id and a 2-byte little-endian payload length
//! - The payload, a 1-byte XOR parity, and a `\r\n` terminator
//!
//! Replies use the `*PIC:` prefix and are followed by an `OK` or
//! `ERROR:<status>` line. Fields may travel as raw bytes or as hex ASCII
//! (see [`FieldEncoding`]).
//!
//! [`FrameReceiver`] turns arbitrary chunks of a byte stream into validated
//! [`Command`]s and resynchronizes on malformed input.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod client;
pub mod codec;
pub mod command;
pub mod error;
pub mod receiver;
pub mod status;

#[cfg(feature = "async")]
pub use async_codec::CommandCodec;
pub use client::CommandClient;
pub use codec::{
    decode_frame, decode_header, decode_reply, encode_command, encode_response, FieldEncoding,
    FrameConfig, ReplyFrame, ACK_ERROR_PREFIX, ACK_OK, COMMAND_PREFIX, DEFAULT_MAX_PAYLOAD,
    MAX_DATA_LENGTH, REPLY_PREFIX, TERMINATOR,
};
pub use command::{parity, Command, CommandRequest, Response};
pub use error::{FrameError, Result};
pub use receiver::{FrameReceiver, ReceiverState};
pub use status::{COMMAND_FAIL_ERROR, INVALID_PARITY_ERROR, NO_ERROR};
