//! AT-style command protocol for serial-attached devices.
//!
//! A host sends `AT*PIC=` frames carrying a command id and a payload; the
//! device dispatches each one to a registered handler and answers with a
//! `*PIC:` reply and an `OK`/`ERROR` line.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte links (serial ports, streams, in-memory)
//! - [`frame`]: the wire codec, the incremental receiver and a host client
//! - [`dispatch`]: handler registration, dispatch and the serve loop
//! - [`diagnostics`]: built-in ping/echo/version/checksum handlers
//!
//! ```
//! use picmd::dispatch::{Dispatcher, HandlerContext, HandlerResult, Runner};
//! use picmd::transport::MemoryTransport;
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher
//!     .register(0x01, |_: &HandlerContext<'_>| -> HandlerResult { Ok(1u64.into()) })
//!     .unwrap();
//!
//! let (transport, handle) = MemoryTransport::scripted([&b"AT*PIC=\x01\x01\x00\x02\x02\r\n"[..]]);
//! Runner::new(transport, dispatcher).run().unwrap();
//! assert!(handle.written().ends_with(b"OK\r\n"));
//! ```

pub mod diagnostics;

/// Re-export transport types.
pub mod transport {
    pub use picmd_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use picmd_frame::*;
}

/// Re-export dispatch types.
pub mod dispatch {
    pub use picmd_dispatch::*;
}
