use std::io::{ErrorKind, Read, Write};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{ShutdownHook, Transport};

/// Adapts any blocking `Read + Write` stream (pty, socket pair, pipe) to
/// [`Transport`].
///
/// Reads block until the peer sends bytes or hangs up. To stop a serve loop
/// from another thread, attach a [`ShutdownHook`] that makes the stream's
/// `read` return ([`StreamTransport::unix`] does this for Unix sockets).
pub struct StreamTransport<S> {
    inner: S,
    closed: bool,
    shutdown: Option<ShutdownHook>,
}

impl<S: Read + Write + Send> StreamTransport<S> {
    /// Wrap a connected stream.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            closed: false,
            shutdown: None,
        }
    }

    /// Attach the hook returned by [`Transport::shutdown_hook`].
    pub fn with_shutdown(mut self, hook: ShutdownHook) -> Self {
        self.shutdown = Some(hook);
        self
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume the transport and return the inner stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Whether [`Transport::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<S: Read + Write + Send> Transport for StreamTransport<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Ok(0);
        }
        Ok(self.inner.read(buf)?)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let mut offset = 0usize;
        while offset < data.len() {
            match self.inner.write(&data[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        debug!("closing stream transport");
        self.inner.flush().map_err(TransportError::Io)
    }

    fn shutdown_hook(&self) -> Option<ShutdownHook> {
        self.shutdown.clone()
    }
}

#[cfg(unix)]
impl StreamTransport<std::os::unix::net::UnixStream> {
    /// Wrap a connected Unix socket. The shutdown hook shuts the socket down
    /// in both directions, so a blocked read returns `Ok(0)`.
    pub fn unix(stream: std::os::unix::net::UnixStream) -> std::io::Result<Self> {
        let peer = stream.try_clone()?;
        let hook = ShutdownHook::new(move || {
            if let Err(err) = peer.shutdown(std::net::Shutdown::Both) {
                debug!(error = %err, "socket shutdown failed");
            }
        });
        Ok(Self::new(stream).with_shutdown(hook))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn reads_then_reports_eof() {
        let mut transport = StreamTransport::new(Cursor::new(b"AT".to_vec()));
        let mut buf = [0u8; 8];

        assert_eq!(transport.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"AT");
        assert_eq!(transport.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn write_after_close_is_rejected() {
        let mut transport = StreamTransport::new(Cursor::new(Vec::<u8>::new()));
        transport.write(b"OK\r\n").unwrap();
        transport.close().unwrap();

        assert!(transport.is_closed());
        assert!(matches!(
            transport.write(b"late"),
            Err(TransportError::Closed)
        ));
        let mut buf = [0u8; 4];
        assert_eq!(transport.read(&mut buf).unwrap(), 0);
        assert_eq!(transport.into_inner().into_inner(), b"OK\r\n");
    }

    #[test]
    fn handles_interrupted_write() {
        let mut transport = StreamTransport::new(InterruptedOnce {
            interrupted: false,
            data: Vec::new(),
        });

        transport.write(b"retry").unwrap();
        assert_eq!(transport.get_ref().data, b"retry");
    }

    #[test]
    fn plain_stream_has_no_shutdown_hook() {
        let transport = StreamTransport::new(Cursor::new(Vec::<u8>::new()));
        assert!(transport.shutdown_hook().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn unix_shutdown_unblocks_read() {
        use std::os::unix::net::UnixStream;
        use std::sync::mpsc;
        use std::time::Duration;

        let (device, _host) = UnixStream::pair().unwrap();
        let mut transport = StreamTransport::unix(device).unwrap();
        let hook = transport.shutdown_hook().unwrap();

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = [0u8; 8];
            let _ = tx.send(transport.read(&mut buf).map_err(|err| err.to_string()));
        });
        std::thread::sleep(Duration::from_millis(50));
        hook.fire();

        let read = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("read should return after shutdown");
        assert_eq!(read, Ok(0));
    }

    #[test]
    fn zero_length_write_means_closed() {
        let mut transport = StreamTransport::new(ZeroWriter);
        assert!(matches!(transport.write(b"x"), Err(TransportError::Closed)));
    }

    struct InterruptedOnce {
        interrupted: bool,
        data: Vec<u8>,
    }

    impl Read for InterruptedOnce {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Ok(0)
        }
    }

    impl Write for InterruptedOnce {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Read for ZeroWriter {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Ok(0)
        }
    }

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
