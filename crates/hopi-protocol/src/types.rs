//! Common protocol types: ids, kinds, statuses and reserved keys

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reserved object key holding the type tag of a wrapped value
pub const TYPE_KEY: &str = "%%hopi_t%%";

/// Reserved object key holding the pre-encoded inner value of a wrapped value
pub const VALUE_KEY: &str = "%%hopi_v%%";

/// Payload of a successful EXEC response
pub const EXEC_OK: &str = "OK";

/// Identifier correlating a response with its request
///
/// Ids are assigned by the channel, starting at zero and strictly increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    /// Wrap a raw id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw numeric id
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RequestId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<u64>()
            .map(Self)
            .map_err(|_| ProtocolError::InvalidId { id: s.to_string() })
    }
}

/// What the interpreter should do with a command's source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    /// Evaluate an expression and return its serialized value
    #[serde(rename = "EVAL")]
    Eval,
    /// Execute statements for their side effects
    #[serde(rename = "EXEC")]
    Exec,
}

impl CommandKind {
    /// The wire spelling of this kind
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eval => "EVAL",
            Self::Exec => "EXEC",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "EVAL" => Ok(Self::Eval),
            "EXEC" => Ok(Self::Exec),
            other => Err(ProtocolError::UnknownKind(other.to_string())),
        }
    }
}

/// Outcome reported by the interpreter for one command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    /// The command completed; the payload is its result
    #[serde(rename = "PASS")]
    Pass,
    /// The command raised; the payload is the failure text
    #[serde(rename = "FAIL")]
    Fail,
}

impl Status {
    /// The wire spelling of this status
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PASS" => Ok(Self::Pass),
            "FAIL" => Ok(Self::Fail),
            other => Err(ProtocolError::UnknownStatus(other.to_string())),
        }
    }
}
