//! Testing utilities
//!
//! Provides a scripted in-memory interpreter so channel consumers can be
//! tested without a real interpreter process.

use crate::channel::Channel;
use hopi_protocol::{Command, CommandKind, EXEC_OK, Response, Status};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex};
use tokio::task::JoinHandle;

const PIPE_CAPACITY: usize = 64 * 1024;

/// In-memory interpreter answering commands through a responder closure
///
/// The responder sees every well-formed command in wire order and returns the
/// status and payload to send back, or `None` to never answer that command.
/// Every command is recorded for later inspection.
///
/// # Example
///
/// ```
/// use hopi_protocol::{CommandKind, Status};
/// use hopi_transport::testing::ScriptedInterpreter;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let interpreter = ScriptedInterpreter::new(|command| {
///     Some((Status::Pass, format!("\"{}\"", command.source)))
/// });
/// let channel = interpreter.channel();
/// let payload = channel.send_and_receive(CommandKind::Eval, "x").await.unwrap();
/// assert_eq!(payload, "\"x\"");
/// assert_eq!(interpreter.count(), 1);
/// # }
/// ```
pub struct ScriptedInterpreter {
    channel: Channel,
    commands: Arc<Mutex<Vec<Command>>>,
    task: JoinHandle<()>,
}

impl ScriptedInterpreter {
    /// Start an interpreter driven by `responder`
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new<F>(responder: F) -> Self
    where
        F: FnMut(&Command) -> Option<(Status, String)> + Send + 'static,
    {
        let (host_out, remote_in) = duplex(PIPE_CAPACITY);
        let (remote_out, host_in) = duplex(PIPE_CAPACITY);
        let commands = Arc::new(Mutex::new(Vec::new()));

        let task = tokio::spawn(serve(
            remote_in,
            remote_out,
            responder,
            Arc::clone(&commands),
        ));

        Self {
            channel: Channel::from_io(host_in, host_out),
            commands,
            task,
        }
    }

    /// Interpreter that acknowledges EXEC and evaluates everything to `null`
    pub fn acknowledging() -> Self {
        Self::new(|command| {
            let payload = match command.kind {
                CommandKind::Exec => EXEC_OK,
                CommandKind::Eval => "null",
            };
            Some((Status::Pass, payload.to_string()))
        })
    }

    /// Channel connected to this interpreter
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    /// Commands received so far
    pub fn commands(&self) -> Vec<Command> {
        self.lock().clone()
    }

    /// Sources of the commands received so far
    pub fn sources(&self) -> Vec<String> {
        self.lock().iter().map(|c| c.source.clone()).collect()
    }

    /// Number of commands received so far
    pub fn count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Command>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ScriptedInterpreter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve<F>(
    input: DuplexStream,
    mut output: DuplexStream,
    mut responder: F,
    commands: Arc<Mutex<Vec<Command>>>,
) where
    F: FnMut(&Command) -> Option<(Status, String)>,
{
    let mut lines = BufReader::new(input).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(command) = Command::parse_line(&line) else {
            tracing::warn!(line = %line, "scripted interpreter skipped malformed command");
            continue;
        };
        commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command.clone());

        if let Some((status, payload)) = responder(&command) {
            let response = Response {
                id: command.id,
                status,
                payload,
            };
            if output.write_all(response.to_line().as_bytes()).await.is_err() {
                break;
            }
        }
    }
}
