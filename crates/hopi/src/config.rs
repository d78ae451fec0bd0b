//! Session configuration

use hopi_transport::{ProcessConfig, StderrCallback};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Environment variable naming the interpreter executable
pub const ENV_INTERPRETER: &str = "HOPI_PYTHON";

/// Environment variable enabling interpreter debug echo
pub const ENV_DEBUG: &str = "HOPI_DEBUG";

/// Configuration for a [`crate::Session`]
///
/// Controls which interpreter is started, how its diagnostics are surfaced and
/// how remote variables are named.
#[derive(Clone)]
pub struct SessionConfig {
    /// Interpreter executable
    pub interpreter: String,

    /// Extra interpreter arguments placed before the bootstrap program
    pub args: Vec<String>,

    /// Environment variables added for the interpreter
    pub env: HashMap<String, String>,

    /// Echo every command line to the interpreter's standard error
    pub debug: bool,

    /// Install [`crate::codec::BuiltinDecoders`] when the session starts
    pub builtin_decoders: bool,

    /// Prefix of the remote variables bound by handles
    pub variable_prefix: String,

    /// Sink for interpreter standard error; `None` logs through `tracing`
    pub stderr: Option<StderrCallback>,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("interpreter", &self.interpreter)
            .field("args", &self.args)
            .field("env", &self.env)
            .field("debug", &self.debug)
            .field("builtin_decoders", &self.builtin_decoders)
            .field("variable_prefix", &self.variable_prefix)
            .field("stderr", &self.stderr.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            debug: false,
            builtin_decoders: true,
            variable_prefix: "_hopi_v".to_string(),
            stderr: None,
        }
    }
}

impl SessionConfig {
    /// Create a session config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `HOPI_PYTHON` and `HOPI_DEBUG`
    ///
    /// `HOPI_DEBUG` is enabled by `1`, `true` or `yes` (any case).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(interpreter) = lookup(ENV_INTERPRETER).filter(|v| !v.trim().is_empty()) {
            config.interpreter = interpreter;
        }
        if let Some(flag) = lookup(ENV_DEBUG) {
            config.debug = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            );
        }
        config
    }

    /// Set the interpreter executable
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Add an interpreter argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set an environment variable for the interpreter
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Enable or disable debug echo
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Enable or disable the builtin decoder pack
    pub fn with_builtin_decoders(mut self, enabled: bool) -> Self {
        self.builtin_decoders = enabled;
        self
    }

    /// Set the remote variable prefix
    ///
    /// Must be a valid identifier; checked when the session starts.
    pub fn with_variable_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.variable_prefix = prefix.into();
        self
    }

    /// Route interpreter standard error to a callback
    pub fn with_stderr<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.stderr = Some(Arc::new(callback));
        self
    }

    pub(crate) fn process_config(&self) -> ProcessConfig {
        let mut process = ProcessConfig::new(self.interpreter.clone()).with_debug(self.debug);
        process.args = self.args.clone();
        process.env = self.env.clone();
        process.stderr = self.stderr.clone();
        process
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert_eq!(config.interpreter, "python3");
        assert_eq!(config.variable_prefix, "_hopi_v");
        assert!(config.builtin_decoders);
        assert!(!config.debug);
        assert!(config.stderr.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = SessionConfig::new()
            .with_interpreter("/opt/venv/bin/python")
            .with_arg("-X")
            .with_env("PYTHONPATH", "/srv/lib")
            .with_debug(true)
            .with_builtin_decoders(false)
            .with_variable_prefix("tmp_")
            .with_stderr(|_| {});

        let process = config.process_config();
        assert_eq!(process.interpreter, "/opt/venv/bin/python");
        assert_eq!(process.args, vec!["-X".to_string()]);
        assert_eq!(process.env.get("PYTHONPATH"), Some(&"/srv/lib".to_string()));
        assert!(process.debug);
        assert!(process.stderr.is_some());
        assert!(!config.builtin_decoders);
        assert_eq!(config.variable_prefix, "tmp_");
    }

    #[rstest]
    #[case(Some("1"), true)]
    #[case(Some("TRUE"), true)]
    #[case(Some(" yes "), true)]
    #[case(Some("0"), false)]
    #[case(Some("off"), false)]
    #[case(None, false)]
    fn test_debug_from_env(#[case] flag: Option<&str>, #[case] expected: bool) {
        let config = SessionConfig::from_lookup(|key| match key {
            ENV_DEBUG => flag.map(str::to_string),
            _ => None,
        });
        assert_eq!(config.debug, expected);
    }

    #[test]
    fn test_interpreter_from_env() {
        let config = SessionConfig::from_lookup(|key| {
            (key == ENV_INTERPRETER).then(|| "/usr/bin/python3.12".to_string())
        });
        assert_eq!(config.interpreter, "/usr/bin/python3.12");

        let config = SessionConfig::from_lookup(|key| (key == ENV_INTERPRETER).then(String::new));
        assert_eq!(config.interpreter, "python3");
    }
}
