//! Channel error types

use hopi_protocol::{ProtocolError, RequestId};
use thiserror::Error;

/// Result type for channel operations
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Errors that can occur while talking to the interpreter process
///
/// `Spawn`, `Io` and `Closed` are transport failures: the process could not be
/// started or is gone. `RemoteExecution` is the normal, recoverable outcome of
/// a command the interpreter rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The interpreter process could not be started
    #[error("failed to spawn interpreter: {0}")]
    Spawn(String),

    /// Reading from or writing to the interpreter failed
    #[error("interpreter I/O error: {0}")]
    Io(String),

    /// The channel was torn down before a response arrived
    #[error("channel closed: {0}")]
    Closed(String),

    /// A line from the interpreter could not be parsed
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The interpreter reported a failure; the text is passed through verbatim
    #[error("{0}")]
    RemoteExecution(String),

    /// The command cannot be framed as a single line
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Another caller is already waiting for this response
    #[error("request {0} is already being awaited")]
    AlreadyAwaited(RequestId),
}

impl ChannelError {
    /// Whether this error means the interpreter is unreachable
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Spawn(_) | Self::Io(_) | Self::Closed(_))
    }
}

impl From<std::io::Error> for ChannelError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
