//! The serve loop.
//!
//! [`Runner`] owns a transport and a [`Dispatcher`] and repeats
//! read → assemble → dispatch → reply until the link closes or a
//! [`StopHandle`] is triggered. Malformed frames are logged and skipped; the
//! receiver resynchronizes on the next prefix.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use picmd_frame::{
    encode_response, Command, FrameConfig, FrameError, FrameReceiver, Response,
    COMMAND_FAIL_ERROR, INVALID_PARITY_ERROR,
};
use picmd_transport::{is_idle, ShutdownHook, Transport};
use tracing::{debug, info, trace, warn};

use crate::dispatcher::Dispatcher;
use crate::error::{DispatchError, Result};

/// Default number of bytes requested from the transport per read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 256;

/// Default cap on bytes the receiver may hold without completing a frame.
pub const DEFAULT_MAX_BUFFERED: usize = 256 * 1024;

/// What to do when a frame names a command with no handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownCommandPolicy {
    /// Stop the loop and return [`DispatchError::CommandNotFound`].
    #[default]
    Propagate,
    /// Reply with `COMMAND_FAIL_ERROR` and keep serving.
    Reply,
}

/// Runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Frame codec settings shared by the receiver and the reply encoder.
    pub frame: FrameConfig,
    /// Bytes requested per transport read. Default: 256.
    pub read_chunk_size: usize,
    /// Unframed bytes tolerated while searching for a prefix before they are
    /// dropped. A partial prefix at the tail survives. Default: 256 KiB.
    pub max_buffered: usize,
    /// Handling of unregistered command ids. Default: propagate.
    pub on_unknown_command: UnknownCommandPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_buffered: DEFAULT_MAX_BUFFERED,
            on_unknown_command: UnknownCommandPolicy::default(),
        }
    }
}

/// Counters collected while serving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunnerStats {
    /// Complete frames handed to the dispatcher.
    pub frames: u64,
    /// Replies written to the transport.
    pub replies: u64,
    /// Frames dropped for a malformed field.
    pub format_errors: u64,
    /// Frames dropped because the terminator was misplaced.
    pub length_errors: u64,
    /// Frames answered with `INVALID_PARITY_ERROR`.
    pub parity_failures: u64,
    /// Times unframed bytes were dropped for exceeding `max_buffered`.
    pub overflows: u64,
}

/// Cloneable handle that asks a running [`Runner`] to stop.
///
/// Stopping sets a flag checked between reads and fires the transport's
/// [`ShutdownHook`], if it has one, so a read blocked on an idle link
/// returns. Transports without a hook must use a read timeout.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    hook: Option<ShutdownHook>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that also fires `hook` when stopped.
    pub fn with_hook(hook: Option<ShutdownHook>) -> Self {
        Self {
            stopped: Arc::new(AtomicBool::new(false)),
            hook,
        }
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(hook) = &self.hook {
            hook.fire();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Serves commands arriving on a transport.
pub struct Runner<T> {
    transport: T,
    dispatcher: Dispatcher,
    receiver: FrameReceiver,
    config: RunnerConfig,
    stop: StopHandle,
    stats: RunnerStats,
    read_buf: Vec<u8>,
    reply_buf: BytesMut,
}

impl<T: Transport> Runner<T> {
    /// Create a runner with default configuration.
    pub fn new(transport: T, dispatcher: Dispatcher) -> Self {
        Self::with_config(transport, dispatcher, RunnerConfig::default())
    }

    /// Create a runner with explicit configuration.
    pub fn with_config(transport: T, dispatcher: Dispatcher, config: RunnerConfig) -> Self {
        let stop = StopHandle::with_hook(transport.shutdown_hook());
        Self {
            transport,
            dispatcher,
            receiver: FrameReceiver::with_config(config.frame),
            read_buf: vec![0u8; config.read_chunk_size.max(1)],
            reply_buf: BytesMut::new(),
            stop,
            stats: RunnerStats::default(),
            config,
        }
    }

    /// A handle that stops [`run`](Self::run) from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Serve until the link reaches EOF or the stop handle fires, then close
    /// the transport.
    ///
    /// Returns the counters on a clean exit. Transport failures and
    /// dispatcher configuration errors end the loop with an error; the
    /// transport is closed either way.
    pub fn run(&mut self) -> Result<RunnerStats> {
        info!(
            encoding = ?self.config.frame.encoding,
            handlers = self.dispatcher.handlers().len(),
            "runner started"
        );

        let result = self.serve();

        if let Err(err) = self.transport.close() {
            debug!(error = %err, "transport close failed");
        }
        if self.receiver.buffered_size() > 0 {
            debug!(
                bytes = self.receiver.buffered_size(),
                "discarding incomplete frame"
            );
            self.receiver.clear();
        }

        match &result {
            Ok(()) => info!(
                frames = self.stats.frames,
                replies = self.stats.replies,
                "runner stopped"
            ),
            Err(err) => warn!(error = %err, "runner stopped with error"),
        }
        result.map(|()| self.stats)
    }

    fn serve(&mut self) -> Result<()> {
        while !self.stop.is_stopped() {
            match self.poll() {
                Ok(true) => {}
                Ok(false) => {
                    debug!("link closed");
                    break;
                }
                // A shut-down link may fail instead of reporting EOF.
                Err(err) if self.stop.is_stopped() => {
                    debug!(error = %err, "link error after stop");
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Perform one read and serve every command it completes.
    ///
    /// Returns `Ok(false)` once the transport reports EOF. An idle read
    /// (timeout) returns `Ok(true)` without touching the receiver.
    pub fn poll(&mut self) -> Result<bool> {
        let mut buf = std::mem::take(&mut self.read_buf);
        let read = self.transport.read(&mut buf);
        let result = match read {
            Ok(0) => Ok(false),
            Ok(n) => self.process_bytes(&buf[..n]).map(|()| true),
            Err(err) if is_idle(&err) => Ok(true),
            Err(err) => Err(err.into()),
        };
        self.read_buf = buf;
        result
    }

    /// Feed bytes to the receiver and reply to every complete command.
    pub fn process_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        trace!(len = bytes.len(), "received bytes");
        if let Err(err) = self.receiver.store_buffer(bytes) {
            self.skip_frame(err)?;
        }

        loop {
            match self.receiver.pull_received_command() {
                Ok(Some(command)) => self.handle_command(&command)?,
                Ok(None) => break,
                Err(err) => self.skip_frame(err)?,
            }
        }

        if self.receiver.buffered_size() > self.config.max_buffered {
            let dropped = self.receiver.discard_noise();
            if dropped > 0 {
                warn!(
                    dropped,
                    max = self.config.max_buffered,
                    "receive buffer overflow, discarding noise"
                );
                self.stats.overflows += 1;
            }
        }
        Ok(())
    }

    /// Dispatch one command and write its reply.
    pub fn handle_command(&mut self, command: &Command) -> Result<()> {
        self.stats.frames += 1;

        let response = match self.dispatcher.execute_command(command) {
            Ok(response) => response,
            Err(DispatchError::CommandNotFound(id))
                if self.config.on_unknown_command == UnknownCommandPolicy::Reply =>
            {
                warn!(id, "no handler for command");
                Response::error(COMMAND_FAIL_ERROR)
            }
            Err(err) => return Err(err),
        };
        if response.status == INVALID_PARITY_ERROR && !command.parity_ok() {
            self.stats.parity_failures += 1;
        }

        self.reply_buf.clear();
        encode_response(
            command.id,
            &response,
            self.config.frame.encoding,
            &mut self.reply_buf,
        )?;
        self.transport.write(&self.reply_buf)?;
        self.stats.replies += 1;
        trace!(id = command.id, status = response.status, "reply written");
        Ok(())
    }

    fn skip_frame(&mut self, err: FrameError) -> Result<()> {
        if !err.is_recoverable() {
            return Err(err.into());
        }
        if matches!(err, FrameError::Length { .. }) {
            self.stats.length_errors += 1;
        } else {
            self.stats.format_errors += 1;
        }
        debug!(error = %err, "skipped malformed frame");
        Ok(())
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn stats(&self) -> RunnerStats {
        self.stats
    }

    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}
