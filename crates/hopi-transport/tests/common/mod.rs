//! Common utilities for tests against a real interpreter

use std::env;
use std::process::{Command, Stdio};

/// Interpreter used by the integration tests
///
/// Honors `HOPI_PYTHON`, falling back to `python3`. Returns `None` (and says
/// so on stderr) when the interpreter cannot be started, so the calling test
/// can return early instead of failing on machines without Python.
pub fn python_or_skip() -> Option<String> {
    let interpreter = env::var("HOPI_PYTHON").unwrap_or_else(|_| "python3".to_string());
    let available = Command::new(&interpreter)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success());

    if available {
        Some(interpreter)
    } else {
        eprintln!("skipping: interpreter {interpreter:?} is not available");
        None
    }
}
