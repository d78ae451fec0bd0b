//! Process management for the interpreter subprocess

use crate::error::{ChannelError, Result};
use crate::subprocess::bootstrap::BOOTSTRAP_SOURCE;
use std::collections::HashMap;
use std::fmt;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

/// Callback receiving each line the interpreter writes to standard error
pub type StderrCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Configuration for spawning the interpreter
#[derive(Clone)]
pub struct ProcessConfig {
    /// Path to the interpreter executable
    pub interpreter: String,

    /// Extra arguments placed before the bootstrap program
    pub args: Vec<String>,

    /// Environment variables added to the inherited environment
    pub env: HashMap<String, String>,

    /// Echo every inbound command line to standard error
    pub debug: bool,

    /// Sink for standard error lines; `None` logs them through `tracing`
    pub stderr: Option<StderrCallback>,
}

impl fmt::Debug for ProcessConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessConfig")
            .field("interpreter", &self.interpreter)
            .field("args", &self.args)
            .field("env", &self.env)
            .field("debug", &self.debug)
            .field("stderr", &self.stderr.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self::new("python3")
    }
}

impl ProcessConfig {
    /// Create a configuration for the given interpreter
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            args: Vec::new(),
            env: HashMap::new(),
            debug: false,
            stderr: None,
        }
    }

    /// Add an interpreter argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set an environment variable for the interpreter
    ///
    /// The interpreter inherits the parent environment (it needs `PATH`,
    /// `PYTHONPATH` and virtualenv settings); variables set here are added on
    /// top.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Enable or disable echoing of inbound command lines
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Route standard error lines to a callback
    pub fn with_stderr<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.stderr = Some(Arc::new(callback));
        self
    }

    /// Build the command line that runs the bootstrap program
    pub(crate) fn command(&self) -> Command {
        let mut cmd = Command::new(&self.interpreter);
        cmd.args(&self.args);
        cmd.arg("-u").arg("-c").arg(BOOTSTRAP_SOURCE);
        if self.debug {
            cmd.arg("--debug");
        }

        cmd.env("PYTHONIOENCODING", "utf-8");
        cmd.env("PYTHONUNBUFFERED", "1");
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        cmd
    }
}

/// A freshly spawned interpreter with its standard streams detached
pub struct SpawnedProcess {
    /// The child process
    pub child: Child,
    /// Interpreter standard input
    pub stdin: ChildStdin,
    /// Interpreter standard output
    pub stdout: ChildStdout,
    /// Interpreter standard error
    pub stderr: ChildStderr,
}

impl SpawnedProcess {
    /// Spawn the interpreter described by `config`
    pub fn spawn(config: &ProcessConfig) -> Result<Self> {
        let mut child = config.command().spawn().map_err(|e| {
            ChannelError::Spawn(format!("failed to start {}: {}", config.interpreter, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ChannelError::Spawn("failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ChannelError::Spawn("failed to capture stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ChannelError::Spawn("failed to capture stderr".to_string()))?;

        tracing::debug!(
            interpreter = %config.interpreter,
            pid = ?child.id(),
            debug = config.debug,
            "spawned interpreter"
        );

        Ok(Self {
            child,
            stdin,
            stdout,
            stderr,
        })
    }
}
