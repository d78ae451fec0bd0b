//! Wire types for the hopi line protocol
//!
//! A host talks to its interpreter process over the interpreter's standard
//! streams, one UTF-8 line per message:
//!
//! ```text
//! request:  <id>=<kind>=<source>      kind   ∈ {EVAL, EXEC}
//! response: <id>=<status>=<payload>   status ∈ {PASS, FAIL}
//! ```
//!
//! Only the first two `=` separate fields, so sources and payloads may contain
//! `=` freely. Neither may contain a line break.
//!
//! # Type Organization
//!
//! - **Common types**: [`types`] - request ids, command kinds, statuses, sentinel keys
//! - **Messages**: [`protocol`] - commands and responses with their line codecs
//! - **Error types**: [`error`] - line parse failures
//!
//! # Design Principles
//!
//! - **Zero I/O**: All types are pure data structures
//! - **No circular dependencies**: hopi-protocol depends only on serde/thiserror

#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! # Usage
//!
//! ```
//! use hopi_protocol::{Command, CommandKind, RequestId, Response, Status};
//!
//! let command = Command::new(RequestId::new(7), CommandKind::Eval, "1 + 1");
//! assert_eq!(command.to_line(), "7=EVAL=1 + 1\n");
//!
//! let response = Response::parse_line("7=PASS=2").unwrap();
//! assert_eq!(response.status, Status::Pass);
//! assert_eq!(response.payload, "2");
//! ```

pub mod error;
pub mod protocol;
pub mod types;

// Re-export commonly used types at crate level
pub use error::{ProtocolError, Result};
pub use protocol::{Command, Response};
pub use types::{CommandKind, EXEC_OK, RequestId, Status, TYPE_KEY, VALUE_KEY};
