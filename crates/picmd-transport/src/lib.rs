//! Byte-stream transport abstraction.
//!
//! The protocol layers above only need three things from a link: read
//! whatever bytes are available, write a reply, and close. This crate
//! provides that [`Transport`] capability over:
//! - serial devices (behind the `serial` feature)
//! - any `Read + Write` stream (ptys, socket pairs)
//! - an in-memory scripted link for tests and demos
//!
//! This is the lowest layer of picmd.

pub mod error;
pub mod memory;
#[cfg(feature = "serial")]
pub mod serial;
pub mod stream;
pub mod traits;

pub use error::{Result, TransportError};
pub use memory::{MemoryHandle, MemoryTransport};
#[cfg(feature = "serial")]
pub use serial::{SerialConfig, SerialTransport, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
pub use stream::StreamTransport;
pub use traits::{is_idle, ShutdownHook, Transport};
