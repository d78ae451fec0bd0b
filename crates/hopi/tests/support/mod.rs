//! Shared setup for tests against a real interpreter

use hopi::{Session, SessionConfig};
use std::env;
use std::process::{Command, Stdio};

/// Start a session on `HOPI_PYTHON` (default `python3`)
///
/// Returns `None` when the interpreter is missing so the test can bail out
/// early on machines without Python.
pub async fn session_or_skip() -> Option<Session> {
    session_with_or_skip(|config| config).await
}

/// Like [`session_or_skip`], with a chance to adjust the configuration
pub async fn session_with_or_skip(
    configure: impl FnOnce(SessionConfig) -> SessionConfig,
) -> Option<Session> {
    let interpreter = env::var("HOPI_PYTHON").unwrap_or_else(|_| "python3".to_string());
    let available = Command::new(&interpreter)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success());
    if !available {
        eprintln!("skipping: interpreter {interpreter:?} is not available");
        return None;
    }

    let config = configure(SessionConfig::new().with_interpreter(interpreter));
    Some(Session::start(config).await.expect("session should start"))
}
