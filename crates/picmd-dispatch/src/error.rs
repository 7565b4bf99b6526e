/// Errors that can occur while configuring or running a dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Command ids are a single byte.
    #[error("command id {0} out of range (0..=255)")]
    InvalidCommandId(u16),

    /// A handler is already registered for this id.
    #[error("handler already registered for command {0:#04x}")]
    DuplicateHandler(u8),

    /// No handler is registered for this id.
    #[error("no handler registered for command {0:#04x}")]
    CommandNotFound(u8),

    /// A handler asked for a provided value that does not exist.
    #[error("handler for command {id:#04x} requires unknown value `{name}`")]
    UnresolvedParameter { id: u8, name: String },

    /// A provided value exists but holds a different type.
    #[error("handler for command {id:#04x} expected `{name}` to be a {expected}")]
    ProvidedTypeMismatch {
        id: u8,
        name: String,
        expected: &'static str,
    },

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] picmd_frame::FrameError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] picmd_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
