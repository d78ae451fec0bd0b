//! Error types for protocol operations
//!
//! A line that cannot be split into its three fields, or whose fields do not
//! hold a valid id, kind or status, is rejected with a [`ProtocolError`].

use thiserror::Error;

/// Result type for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur while parsing a protocol line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line has fewer than two `=` separators
    #[error("missing '=' separator in line {line:?}")]
    MissingSeparator {
        /// The offending line
        line: String,
    },

    /// The id field is not a non-negative integer
    #[error("invalid request id {id:?}")]
    InvalidId {
        /// The raw id field
        id: String,
    },

    /// The kind field is neither EVAL nor EXEC
    #[error("unknown command kind {0:?}")]
    UnknownKind(String),

    /// The status field is neither PASS nor FAIL
    #[error("unknown response status {0:?}")]
    UnknownStatus(String),
}
