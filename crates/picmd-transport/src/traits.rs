use std::fmt;
use std::io::ErrorKind;
use std::sync::Arc;

use crate::error::{Result, TransportError};

/// Callback that unblocks a transport's pending `read` from another thread.
///
/// Obtained from [`Transport::shutdown_hook`] before the transport is moved
/// into a serve loop. Firing it makes the blocked read return (normally with
/// `Ok(0)`); it may be fired more than once.
#[derive(Clone)]
pub struct ShutdownHook(Arc<dyn Fn() + Send + Sync>);

impl ShutdownHook {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn fire(&self) {
        (self.0)()
    }
}

impl fmt::Debug for ShutdownHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHook").finish_non_exhaustive()
    }
}

/// A half-duplex byte link: read what is available, write replies, close.
///
/// Reads may return chunks of any size. `Ok(0)` means the link reached EOF
/// or was closed and no more bytes will arrive. Transports configured with a
/// read timeout report an expired wait as an I/O error of kind `TimedOut` or
/// `WouldBlock`; see [`is_idle`].
///
/// A transport whose `read` can block indefinitely must either be configured
/// with a read timeout or return a [`ShutdownHook`], otherwise a stop request
/// is only noticed once bytes arrive.
pub trait Transport: Send {
    /// Read available bytes into `buf` (blocking up to the transport's timeout).
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write all of `data` and flush it to the link.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Close the link. Subsequent reads return `Ok(0)`.
    fn close(&mut self) -> Result<()>;

    /// A hook that interrupts a blocked [`read`](Transport::read) from
    /// another thread, if the transport has one.
    fn shutdown_hook(&self) -> Option<ShutdownHook> {
        None
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn shutdown_hook(&self) -> Option<ShutdownHook> {
        (**self).shutdown_hook()
    }
}

/// Returns true if the error only signals that no bytes arrived in time.
pub fn is_idle(err: &TransportError) -> bool {
    matches!(
        err,
        TransportError::Io(io)
            if matches!(
                io.kind(),
                ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
            )
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_idle() {
        let err = TransportError::Io(std::io::Error::from(ErrorKind::TimedOut));
        assert!(is_idle(&err));
        let err = TransportError::Io(std::io::Error::from(ErrorKind::WouldBlock));
        assert!(is_idle(&err));
    }

    #[test]
    fn shutdown_hook_clones_share_callback() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let hook = ShutdownHook::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        hook.clone().fire();
        hook.fire();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn hard_errors_are_not_idle() {
        let err = TransportError::Io(std::io::Error::from(ErrorKind::BrokenPipe));
        assert!(!is_idle(&err));
        assert!(!is_idle(&TransportError::Closed));
    }
}
