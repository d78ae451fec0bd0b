//! Protocol message types exchanged with the interpreter process
//!
//! Both directions share the `<id>=<tag>=<text>` framing. Only the first two
//! `=` are separators; everything after the second belongs to the text field.

use crate::error::{ProtocolError, Result};
use crate::types::{CommandKind, RequestId, Status};
use serde::{Deserialize, Serialize};

/// Command sent from the host to the interpreter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Correlation id assigned by the channel
    pub id: RequestId,

    /// Whether to evaluate or execute the source
    pub kind: CommandKind,

    /// Source text, never containing a line break
    pub source: String,
}

impl Command {
    /// Create a new command
    pub fn new(id: RequestId, kind: CommandKind, source: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            source: source.into(),
        }
    }

    /// Encode as a newline-terminated wire line
    pub fn to_line(&self) -> String {
        format!("{}={}={}\n", self.id, self.kind, self.source)
    }

    /// Parse a wire line (with or without its trailing newline)
    pub fn parse_line(line: &str) -> Result<Self> {
        let (id, kind, source) = split_fields(line)?;
        Ok(Self {
            id: id.parse()?,
            kind: kind.parse()?,
            source: source.to_string(),
        })
    }
}

/// Response sent from the interpreter to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the command this response answers
    pub id: RequestId,

    /// Whether the command succeeded
    pub status: Status,

    /// Result text on success, failure text on failure
    pub payload: String,
}

impl Response {
    /// Create a successful response
    pub fn pass(id: RequestId, payload: impl Into<String>) -> Self {
        Self {
            id,
            status: Status::Pass,
            payload: payload.into(),
        }
    }

    /// Create a failed response
    pub fn fail(id: RequestId, payload: impl Into<String>) -> Self {
        Self {
            id,
            status: Status::Fail,
            payload: payload.into(),
        }
    }

    /// Whether the command succeeded
    pub fn is_pass(&self) -> bool {
        self.status == Status::Pass
    }

    /// Encode as a newline-terminated wire line
    pub fn to_line(&self) -> String {
        format!("{}={}={}\n", self.id, self.status, self.payload)
    }

    /// Parse a wire line (with or without its trailing newline)
    pub fn parse_line(line: &str) -> Result<Self> {
        let (id, status, payload) = split_fields(line)?;
        Ok(Self {
            id: id.parse()?,
            status: status.parse()?,
            payload: payload.to_string(),
        })
    }
}

/// Split a line at its first two `=`
fn split_fields(line: &str) -> Result<(&str, &str, &str)> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);

    let missing = || ProtocolError::MissingSeparator {
        line: line.to_string(),
    };
    let (id, rest) = line.split_once('=').ok_or_else(missing)?;
    let (tag, text) = rest.split_once('=').ok_or_else(missing)?;
    Ok((id, tag, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[test]
    fn test_command_to_line() {
        let command = Command::new(RequestId::new(3), CommandKind::Exec, "v0=[1, 2]");
        assert_eq!(command.to_line(), "3=EXEC=v0=[1, 2]\n");
    }

    #[test]
    fn test_command_parse_keeps_equals_in_source() {
        let command = Command::parse_line("12=EXEC=a = a+1\n").unwrap();
        assert_eq!(command.id, RequestId::new(12));
        assert_eq!(command.kind, CommandKind::Exec);
        assert_eq!(command.source, "a = a+1");
    }

    #[rstest]
    #[case("0=PASS=OK", Status::Pass, "OK")]
    #[case("1=PASS=", Status::Pass, "")]
    #[case("2=FAIL=KeyError(10)", Status::Fail, "KeyError(10)")]
    #[case("3=PASS={\"a\": \"b=c\"}\r\n", Status::Pass, "{\"a\": \"b=c\"}")]
    fn test_response_parse(#[case] line: &str, #[case] status: Status, #[case] payload: &str) {
        let response = Response::parse_line(line).unwrap();
        assert_eq!(response.status, status);
        assert_eq!(response.payload, payload);
    }

    #[rstest]
    #[case("garbage")]
    #[case("5=PASS")]
    #[case("")]
    fn test_response_missing_separator(#[case] line: &str) {
        assert!(matches!(
            Response::parse_line(line),
            Err(ProtocolError::MissingSeparator { .. })
        ));
    }

    #[test]
    fn test_response_bad_fields() {
        assert!(matches!(
            Response::parse_line("x=PASS=1"),
            Err(ProtocolError::InvalidId { .. })
        ));
        assert_eq!(
            Response::parse_line("1=MAYBE=1"),
            Err(ProtocolError::UnknownStatus("MAYBE".to_string()))
        );
    }

    #[test]
    fn test_response_constructors() {
        let ok = Response::pass(RequestId::new(1), "OK");
        assert!(ok.is_pass());
        assert_eq!(ok.to_line(), "1=PASS=OK\n");

        let failed = Response::fail(RequestId::new(2), "NameError('x')");
        assert!(!failed.is_pass());
        assert_eq!(failed.to_line(), "2=FAIL=NameError('x')\n");
    }

    proptest! {
        /// Property: payloads survive framing regardless of embedded separators
        #[test]
        fn prop_payload_with_separators_survives(
            id in any::<u64>(),
            payload in "[^\r\n]*",
        ) {
            let line = Response::pass(RequestId::new(id), payload.clone()).to_line();
            let parsed = Response::parse_line(&line).expect("framed line parses");
            prop_assert_eq!(parsed.id, RequestId::new(id));
            prop_assert_eq!(parsed.payload, payload);
        }
    }
}
