//! Error types for hopi sessions
//!
//! Two classes of failure reach callers:
//! - Infrastructure: [`HopiError::Transport`] and [`HopiError::Protocol`]. The
//!   interpreter is gone or speaking garbage; the session is not usable.
//! - Contract: [`HopiError::RemoteExecution`], [`HopiError::Decode`] and
//!   [`HopiError::Usage`]. The session stays usable.
//!
//! Errors are `Clone` so a single failed handle can report the same error to
//! every caller that awaits it. Nothing is retried.

use hopi_transport::ChannelError;
use thiserror::Error;

/// Result type for hopi operations
pub type Result<T> = std::result::Result<T, HopiError>;

/// Errors that can occur while driving the interpreter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HopiError {
    /// The interpreter could not be started or is no longer reachable
    #[error("transport error: {0}")]
    Transport(String),

    /// The interpreter produced a line that is not a valid response
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The interpreter raised; the text is its exception representation
    ///
    /// Statements that ran before the failure keep their effects.
    #[error("{0}")]
    RemoteExecution(String),

    /// A result payload could not be turned into a [`crate::Value`]
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The API was used incorrectly; nothing was sent
    #[error("usage error: {0}")]
    Usage(String),
}

impl HopiError {
    /// Whether the interpreter is unreachable
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether the interpreter raised an exception
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::RemoteExecution(_))
    }

    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}

impl From<ChannelError> for HopiError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::RemoteExecution(text) => Self::RemoteExecution(text),
            ChannelError::Protocol(e) => Self::Protocol(e.to_string()),
            e @ (ChannelError::InvalidCommand(_) | ChannelError::AlreadyAwaited(_)) => {
                Self::Usage(e.to_string())
            }
            e @ (ChannelError::Spawn(_) | ChannelError::Io(_) | ChannelError::Closed(_)) => {
                Self::Transport(e.to_string())
            }
        }
    }
}

/// Failures turning an interpreter payload into a host value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A tagged value arrived for a type with no registered decoder
    #[error("no decoder registered for type {0}")]
    UnregisteredType(String),

    /// The payload is not valid JSON
    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A registered decoder refused its input
    #[error("decoder for {tag} rejected value: {message}")]
    Rejected {
        /// Type tag of the decoder
        tag: String,
        /// Why the input was refused
        message: String,
    },

    /// A decoded value does not fit the requested host type
    #[error("cannot convert value: {0}")]
    Conversion(String),
}

impl DecodeError {
    /// Rejection raised from inside a decoder for `tag`
    pub fn rejected(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            tag: tag.into(),
            message: message.into(),
        }
    }
}
