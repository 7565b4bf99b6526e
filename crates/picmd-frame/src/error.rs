use picmd_transport::TransportError;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A header or body field is malformed (non-hex digits, length over the
    /// configured maximum, bad reply checksum).
    #[error("invalid frame format: {0}")]
    Format(String),

    /// The terminator is not where the declared length puts it. The frame's
    /// bytes have already been consumed.
    #[error("frame length mismatch: terminator not found at end of {frame_len}-byte frame")]
    Length { frame_len: usize },

    /// The payload exceeds the protocol or configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// No reply arrived within the configured timeout.
    #[error("no reply within {0:?}")]
    Timeout(std::time::Duration),

    /// The link was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// An I/O error surfaced by an async codec driver.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether the receiver recovers from this error by resynchronizing.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::Format(_) | FrameError::Length { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_frame_local_errors_are_recoverable() {
        assert!(FrameError::Format("bad hex".into()).is_recoverable());
        assert!(FrameError::Length { frame_len: 14 }.is_recoverable());
        assert!(!FrameError::ConnectionClosed.is_recoverable());
        assert!(!FrameError::Transport(TransportError::Closed).is_recoverable());
    }
}
