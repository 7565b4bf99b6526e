//! Handler-facing types.
//!
//! A handler is any `Fn(&HandlerContext) -> HandlerResult`. The context is
//! the handler's only view of the request: the payload (`data`), its size
//! (`size`), and named values provided to the dispatcher during setup.
//!
//! ```
//! use picmd_dispatch::{HandlerContext, HandlerError, HandlerResult};
//!
//! fn first_byte(ctx: &HandlerContext<'_>) -> HandlerResult {
//!     match ctx.payload().first() {
//!         Some(byte) => Ok((*byte).into()),
//!         None => Err(HandlerError::domain(0x10, "empty payload")),
//!     }
//! }
//! ```

use std::any::Any;

use bytes::Bytes;
use picmd_frame::Command;

use crate::provided::ProvidedValues;

/// Result type returned by handlers.
pub type HandlerResult = Result<Reply, HandlerError>;

/// A successful handler result.
///
/// Integers encode as a fixed 8-byte little-endian field; byte and string
/// results are sent as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Reply {
    /// No reply data.
    #[default]
    Empty,
    /// A signed integer (two's complement).
    Int(i64),
    /// An unsigned integer.
    UInt(u64),
    /// Raw reply bytes.
    Bytes(Bytes),
}

impl Reply {
    /// The reply data as sent on the wire.
    pub fn into_bytes(self) -> Bytes {
        match self {
            Reply::Empty => Bytes::new(),
            Reply::Int(value) => Bytes::copy_from_slice(&value.to_le_bytes()),
            Reply::UInt(value) => Bytes::copy_from_slice(&value.to_le_bytes()),
            Reply::Bytes(bytes) => bytes,
        }
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::Empty
    }
}

impl From<bool> for Reply {
    fn from(value: bool) -> Self {
        Reply::UInt(u64::from(value))
    }
}

macro_rules! reply_from_int {
    ($variant:ident => $wide:ty: $($ty:ty),*) => {
        $(
            impl From<$ty> for Reply {
                fn from(value: $ty) -> Self {
                    Reply::$variant(value as $wide)
                }
            }
        )*
    };
}

reply_from_int!(Int => i64: i8, i16, i32, i64, isize);
reply_from_int!(UInt => u64: u8, u16, u32, u64, usize);

impl From<Bytes> for Reply {
    fn from(value: Bytes) -> Self {
        Reply::Bytes(value)
    }
}

impl From<Vec<u8>> for Reply {
    fn from(value: Vec<u8>) -> Self {
        Reply::Bytes(Bytes::from(value))
    }
}

impl From<&'static [u8]> for Reply {
    fn from(value: &'static [u8]) -> Self {
        Reply::Bytes(Bytes::from_static(value))
    }
}

impl From<String> for Reply {
    fn from(value: String) -> Self {
        Reply::Bytes(Bytes::from(value))
    }
}

impl From<&'static str> for Reply {
    fn from(value: &'static str) -> Self {
        Reply::Bytes(Bytes::from_static(value.as_bytes()))
    }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(value: Option<T>) -> Self {
        value.map_or(Reply::Empty, Into::into)
    }
}

/// A failed handler result.
///
/// Only a `Domain` error with a status in `1..=255` and a description of at
/// most 65535 bytes reaches the wire as-is. Everything else is answered with
/// the generic command-failure status and an empty body.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// A failure the handler wants reported with its own status code.
    #[error("domain error (status {status}, {} byte description)", .description.len())]
    Domain { status: u16, description: Bytes },

    /// Any other failure. Logged, never sent.
    #[error("handler failed: {0}")]
    Failure(Box<dyn std::error::Error + Send + Sync>),

    /// The handler asked for a value that was never provided.
    #[error("no provided value named `{name}`")]
    Unresolved { name: String },

    /// The provided value has a different type than requested.
    #[error("provided value `{name}` is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },
}

impl HandlerError {
    /// A domain error with a status code and description.
    pub fn domain(status: u16, description: impl Into<Bytes>) -> Self {
        HandlerError::Domain {
            status,
            description: description.into(),
        }
    }

    /// A generic failure.
    pub fn failure(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        HandlerError::Failure(err.into())
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        HandlerError::Failure(Box::new(err))
    }
}

/// Per-dispatch view of the request handed to a handler.
pub struct HandlerContext<'a> {
    command: &'a Command,
    provided: &'a ProvidedValues,
}

impl<'a> HandlerContext<'a> {
    pub fn new(command: &'a Command, provided: &'a ProvidedValues) -> Self {
        Self { command, provided }
    }

    /// The command id being served.
    pub fn id(&self) -> u8 {
        self.command.id
    }

    /// The request payload (`data`).
    pub fn payload(&self) -> &[u8] {
        &self.command.payload
    }

    /// The request payload as a shared buffer.
    pub fn payload_bytes(&self) -> Bytes {
        self.command.payload.clone()
    }

    /// The declared payload size (`size`).
    pub fn payload_size(&self) -> u16 {
        self.command.size
    }

    /// The whole command.
    pub fn command(&self) -> &Command {
        self.command
    }

    /// A provided value by name.
    ///
    /// Propagate the error with `?`: the dispatcher turns it into a
    /// configuration error for its caller rather than a reply.
    pub fn get<T: Any>(&self, name: &str) -> Result<&'a T, HandlerError> {
        self.provided.get::<T>(name)
    }

    /// Whether a value is provided under `name`.
    pub fn has(&self, name: &str) -> bool {
        self.provided.contains(name)
    }
}

/// A command handler.
///
/// Implemented for every `Fn(&HandlerContext) -> HandlerResult`; implement
/// it directly for handlers that carry state.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: &HandlerContext<'_>) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&HandlerContext<'_>) -> HandlerResult + Send + Sync + 'static,
{
    fn call(&self, ctx: &HandlerContext<'_>) -> HandlerResult {
        self(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_encode_as_eight_le_bytes() {
        assert_eq!(Reply::from(2i32).into_bytes().as_ref(), b"\x02\0\0\0\0\0\0\0");
        assert_eq!(Reply::from(1u8).into_bytes().as_ref(), b"\x01\0\0\0\0\0\0\0");
        assert_eq!(Reply::from(-1i64).into_bytes().as_ref(), &[0xff; 8]);
        assert_eq!(Reply::from(true).into_bytes().len(), 8);
    }

    #[test]
    fn empty_and_byte_replies() {
        assert!(Reply::from(()).into_bytes().is_empty());
        assert!(Reply::from(None::<u32>).into_bytes().is_empty());
        assert_eq!(Reply::from("pong").into_bytes().as_ref(), b"pong");
        assert_eq!(Reply::from(vec![1, 2, 3]).into_bytes().as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn context_exposes_request() {
        let command = Command::with_parity(0x05, &b"hi"[..]).unwrap();
        let provided = ProvidedValues::new().with("scale", 3u32);
        let ctx = HandlerContext::new(&command, &provided);

        assert_eq!(ctx.id(), 0x05);
        assert_eq!(ctx.payload(), b"hi");
        assert_eq!(ctx.payload_size(), 2);
        assert_eq!(*ctx.get::<u32>("scale").unwrap(), 3);
        assert!(ctx.has("scale"));
        assert!(!ctx.has("missing"));
    }

    #[test]
    fn closures_are_handlers() {
        let handler = |ctx: &HandlerContext<'_>| -> HandlerResult { Ok(ctx.payload().len().into()) };
        let command = Command::with_parity(0x01, &b"abc"[..]).unwrap();
        let provided = ProvidedValues::new();

        let reply = Handler::call(&handler, &HandlerContext::new(&command, &provided)).unwrap();
        assert_eq!(reply, Reply::UInt(3));
    }

    #[test]
    fn failure_from_str() {
        let err = HandlerError::failure("boom");
        assert_eq!(err.to_string(), "handler failed: boom");
    }
}
