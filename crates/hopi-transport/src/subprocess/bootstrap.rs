//! The program the interpreter runs to serve the line protocol

/// Python source executed with `-u -c` when the channel starts
///
/// It keeps a private namespace for every command, answers EXEC with
/// [`EXEC_OK`](hopi_protocol::EXEC_OK), serializes EVAL results as JSON with
/// sentinel-wrapped values, and reports exceptions with their `repr`. Passing
/// `--debug` makes it echo every inbound line to stderr.
pub const BOOTSTRAP_SOURCE: &str = include_str!("bootstrap.py");

#[cfg(test)]
mod tests {
    use super::*;
    use hopi_protocol::{EXEC_OK, TYPE_KEY, VALUE_KEY};

    #[test]
    fn test_bootstrap_agrees_with_protocol_constants() {
        assert!(BOOTSTRAP_SOURCE.contains(&format!("TYPE_KEY = \"{TYPE_KEY}\"")));
        assert!(BOOTSTRAP_SOURCE.contains(&format!("VALUE_KEY = \"{VALUE_KEY}\"")));
        assert!(BOOTSTRAP_SOURCE.contains(&format!("EXEC_OK = \"{EXEC_OK}\"")));
        assert!(BOOTSTRAP_SOURCE.contains("__hopi_register__"));
    }
}
