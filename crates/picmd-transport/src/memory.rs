//! In-memory scripted link.
//!
//! [`MemoryTransport`] plays the device side; the paired [`MemoryHandle`]
//! plays the host: it pushes inbound chunks, inspects everything written
//! back, and hangs up. Reads block until a chunk is queued, the link is
//! closed, or the poll interval expires (reported as `TimedOut`).
//! A host hang-up ends reads once the queue drains but keeps capturing
//! writes; closing the device side rejects further writes.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use bytes::{Buf, Bytes};

use crate::error::{Result, TransportError};
use crate::traits::{ShutdownHook, Transport};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Default)]
struct Link {
    inbound: VecDeque<Bytes>,
    written: Vec<u8>,
    hung_up: bool,
    closed: bool,
}

impl Link {
    fn at_eof(&self) -> bool {
        self.hung_up || self.closed
    }
}

#[derive(Default)]
struct Shared {
    link: Mutex<Link>,
    ready: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Link> {
        self.link.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn close_device(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }
}

/// Device side of an in-memory link.
pub struct MemoryTransport {
    shared: Arc<Shared>,
    poll_interval: Duration,
}

/// Host side of an in-memory link.
#[derive(Clone)]
pub struct MemoryHandle {
    shared: Arc<Shared>,
}

impl MemoryTransport {
    /// Create an empty link and its host handle.
    pub fn pair() -> (Self, MemoryHandle) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: Arc::clone(&shared),
                poll_interval: DEFAULT_POLL_INTERVAL,
            },
            MemoryHandle { shared },
        )
    }

    /// Create a link with pre-queued inbound chunks, followed by a host
    /// hang-up: reads report EOF once every chunk was delivered.
    pub fn scripted<I, B>(chunks: I) -> (Self, MemoryHandle)
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        let (transport, handle) = Self::pair();
        for chunk in chunks {
            handle.push(chunk);
        }
        handle.close();
        (transport, handle)
    }

    /// How long a read waits for data before reporting `TimedOut`.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl Transport for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut link = self.shared.lock();
        loop {
            if let Some(mut chunk) = link.inbound.pop_front() {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                chunk.advance(n);
                if !chunk.is_empty() {
                    link.inbound.push_front(chunk);
                }
                return Ok(n);
            }

            // Queued bytes drain before EOF is reported.
            if link.at_eof() {
                return Ok(0);
            }

            let (guard, wait) = self
                .shared
                .ready
                .wait_timeout(link, self.poll_interval)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            link = guard;
            if wait.timed_out() && link.inbound.is_empty() && !link.at_eof() {
                return Err(TransportError::Io(std::io::Error::from(
                    ErrorKind::TimedOut,
                )));
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut link = self.shared.lock();
        if link.closed {
            return Err(TransportError::Closed);
        }
        link.written.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.shared.close_device();
        Ok(())
    }

    fn shutdown_hook(&self) -> Option<ShutdownHook> {
        let shared = Arc::clone(&self.shared);
        Some(ShutdownHook::new(move || shared.close_device()))
    }
}

impl MemoryHandle {
    /// Queue an inbound chunk for the device side.
    pub fn push(&self, chunk: impl Into<Bytes>) {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return;
        }
        self.shared.lock().inbound.push_back(chunk);
        self.shared.ready.notify_all();
    }

    /// Everything the device side has written so far.
    pub fn written(&self) -> Vec<u8> {
        self.shared.lock().written.clone()
    }

    /// Take and clear everything written so far.
    pub fn take_written(&self) -> Vec<u8> {
        std::mem::take(&mut self.shared.lock().written)
    }

    /// Hang up. Chunks already queued are still delivered, then reads
    /// report EOF.
    pub fn close(&self) {
        self.shared.lock().hung_up = true;
        self.shared.ready.notify_all();
    }

    /// Whether either side closed the link.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().at_eof()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::is_idle;

    #[test]
    fn delivers_chunks_in_order_then_eof() {
        let (mut transport, handle) =
            MemoryTransport::scripted([&b"AT*"[..], &b"PIC="[..]]);
        handle.close();

        let mut buf = [0u8; 16];
        let n = transport.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"AT*");
        let n = transport.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"PIC=");
        assert_eq!(transport.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn splits_chunks_larger_than_read_buffer() {
        let (mut transport, _handle) = MemoryTransport::scripted([&b"abcdef"[..]]);

        let mut buf = [0u8; 4];
        let n = transport.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"abcd");
        let n = transport.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ef");
    }

    #[test]
    fn empty_link_reports_idle() {
        let (transport, _handle) = MemoryTransport::pair();
        let mut transport = transport.with_poll_interval(Duration::from_millis(1));

        let mut buf = [0u8; 4];
        let err = transport.read(&mut buf).unwrap_err();
        assert!(is_idle(&err));
    }

    #[test]
    fn captures_writes_until_closed() {
        let (mut transport, handle) = MemoryTransport::pair();
        transport.write(b"*PIC:").unwrap();
        transport.write(b"OK\r\n").unwrap();
        assert_eq!(handle.written(), b"*PIC:OK\r\n");

        transport.close().unwrap();
        assert!(handle.is_closed());
        assert!(matches!(transport.write(b"x"), Err(TransportError::Closed)));
        assert_eq!(handle.take_written(), b"*PIC:OK\r\n");
        assert!(handle.written().is_empty());
    }

    #[test]
    fn hang_up_still_captures_replies() {
        let (mut transport, handle) = MemoryTransport::scripted([&b"AT*PIC="[..]]);
        assert!(handle.is_closed());

        let mut buf = [0u8; 16];
        assert_eq!(transport.read(&mut buf).unwrap(), 7);
        transport.write(b"OK\r\n").unwrap();
        assert_eq!(transport.read(&mut buf).unwrap(), 0);
        assert_eq!(handle.written(), b"OK\r\n");
    }

    #[test]
    fn close_from_another_thread_unblocks_read() {
        let (transport, handle) = MemoryTransport::pair();
        let mut transport = transport.with_poll_interval(Duration::from_secs(5));

        let reader = std::thread::spawn(move || {
            let mut buf = [0u8; 4];
            transport.read(&mut buf).unwrap()
        });
        std::thread::sleep(Duration::from_millis(20));
        handle.close();

        assert_eq!(reader.join().unwrap(), 0);
    }

    #[test]
    fn shutdown_hook_closes_device_side() {
        let (transport, handle) = MemoryTransport::pair();
        let mut transport = transport.with_poll_interval(Duration::from_secs(5));
        let hook = transport.shutdown_hook().expect("memory link has a hook");

        let reader = std::thread::spawn(move || {
            let mut buf = [0u8; 4];
            let n = transport.read(&mut buf).unwrap();
            (n, transport.write(b"late").is_err())
        });
        std::thread::sleep(Duration::from_millis(20));
        hook.fire();

        assert_eq!(reader.join().unwrap(), (0, true));
        assert!(handle.is_closed());
        assert!(handle.written().is_empty());
    }
}
