//! Framed, correlated messaging with the interpreter process
//!
//! A [`Channel`] owns the interpreter's standard streams. Commands are queued
//! to a writer task in send order; a reader task parses responses and hands
//! them to whoever waits for their id.

use crate::error::{ChannelError, Result};
use crate::pending::{Claim, PendingTable};
use crate::subprocess::{ProcessConfig, SpawnedProcess, StderrCallback};
use hopi_protocol::{Command, CommandKind, RequestId, Response};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStderr};
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinHandle;

/// Id allocation and the writer queue, locked together so wire order matches id order
struct Outbound {
    next_id: u64,
    tx: mpsc::UnboundedSender<String>,
}

/// Kill switch for a spawned interpreter
struct Monitor {
    kill: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct Inner {
    outbound: Mutex<Outbound>,
    pending: Arc<PendingTable>,
    shutdown: Arc<Notify>,
    monitor: tokio::sync::Mutex<Option<Monitor>>,
    debug: bool,
}

/// Bidirectional, id-correlated channel to one interpreter
///
/// Cloning is cheap and every clone talks to the same interpreter. The
/// interpreter is terminated when [`Channel::kill`] is called or the last
/// clone is dropped.
///
/// # Example
///
/// ```no_run
/// use hopi_protocol::CommandKind;
/// use hopi_transport::Channel;
///
/// # async fn example() -> hopi_transport::Result<()> {
/// let channel = Channel::spawn("python3", false).await?;
/// channel.send_and_receive(CommandKind::Exec, "a = 40").await?;
/// let payload = channel.send_and_receive(CommandKind::Eval, "a + 2").await?;
/// assert_eq!(payload, "42");
/// channel.kill().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Channel {
    inner: Arc<Inner>,
}

impl Channel {
    /// Spawn `interpreter` running the bootstrap program
    ///
    /// With `debug`, the interpreter echoes every command line to its
    /// standard error, which is logged.
    pub async fn spawn(interpreter: impl Into<String>, debug: bool) -> Result<Self> {
        Self::start(ProcessConfig::new(interpreter).with_debug(debug)).await
    }

    /// Spawn the interpreter described by `config`
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Spawn`] if the process cannot be started.
    pub async fn start(config: ProcessConfig) -> Result<Self> {
        let SpawnedProcess {
            child,
            stdin,
            stdout,
            stderr,
        } = SpawnedProcess::spawn(&config)?;

        spawn_stderr_task(stderr, config.stderr.clone());

        let pending = Arc::new(PendingTable::new());
        let (kill, kill_rx) = oneshot::channel();
        let task = tokio::spawn(watch_process(child, kill_rx, Arc::clone(&pending)));

        Ok(Self::assemble(
            stdout,
            stdin,
            pending,
            config.debug,
            Some(Monitor { kill, task }),
        ))
    }

    /// Build a channel over arbitrary streams instead of a subprocess
    ///
    /// `reader` yields response lines and `writer` receives command lines.
    /// Must be called inside a Tokio runtime.
    pub fn from_io<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::assemble(reader, writer, Arc::new(PendingTable::new()), false, None)
    }

    fn assemble<R, W>(
        reader: R,
        writer: W,
        pending: Arc<PendingTable>,
        debug: bool,
        monitor: Option<Monitor>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(read_responses(reader, Arc::clone(&pending)));
        tokio::spawn(write_commands(
            writer,
            rx,
            Arc::clone(&pending),
            Arc::clone(&shutdown),
        ));

        Self {
            inner: Arc::new(Inner {
                outbound: Mutex::new(Outbound { next_id: 0, tx }),
                pending,
                shutdown,
                monitor: tokio::sync::Mutex::new(monitor),
                debug,
            }),
        }
    }

    /// Queue a command without waiting for its completion
    ///
    /// # Errors
    ///
    /// - [`ChannelError::InvalidCommand`] if `source` contains a line break
    /// - [`ChannelError::Closed`] if the channel was torn down
    pub fn send(&self, kind: CommandKind, source: &str) -> Result<RequestId> {
        if source.contains(['\n', '\r']) {
            return Err(ChannelError::InvalidCommand(
                "source text must not contain line breaks".to_string(),
            ));
        }
        if let Some(reason) = self.inner.pending.close_reason() {
            return Err(ChannelError::Closed(reason));
        }

        let mut outbound = self
            .inner
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let id = RequestId::new(outbound.next_id);
        let line = Command::new(id, kind, source).to_line();
        outbound
            .tx
            .send(line)
            .map_err(|_| ChannelError::Closed("writer stopped".to_string()))?;
        outbound.next_id += 1;
        drop(outbound);

        tracing::trace!(%id, %kind, source, "sent command");
        Ok(id)
    }

    /// Wait for the response to `id` and remove it from the pending table
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Closed`] if the channel is torn down first
    /// - [`ChannelError::AlreadyAwaited`] if another caller waits for `id`
    pub async fn receive(&self, id: RequestId) -> Result<Response> {
        match self.inner.pending.claim(id)? {
            Claim::Ready(response) => Ok(response),
            Claim::Wait(rx) => rx.await.unwrap_or_else(|_| {
                Err(ChannelError::Closed("response table dropped".to_string()))
            }),
        }
    }

    /// Wait for the response to `id` and return its payload
    ///
    /// # Errors
    ///
    /// Everything [`Channel::receive`] returns, plus
    /// [`ChannelError::RemoteExecution`] carrying the failure text when the
    /// interpreter reports FAIL.
    pub async fn receive_payload(&self, id: RequestId) -> Result<String> {
        let response = self.receive(id).await?;
        if response.is_pass() {
            Ok(response.payload)
        } else {
            Err(ChannelError::RemoteExecution(response.payload))
        }
    }

    /// Send a command and wait for its payload
    ///
    /// # Errors
    ///
    /// See [`Channel::send`] and [`Channel::receive_payload`].
    pub async fn send_and_receive(&self, kind: CommandKind, source: &str) -> Result<String> {
        let id = self.send(kind, source)?;
        self.receive_payload(id).await
    }

    /// Terminate the interpreter and fail every outstanding request
    ///
    /// Calling it again is a no-op.
    pub async fn kill(&self) {
        let monitor = self.inner.monitor.lock().await.take();
        if let Some(Monitor { kill, task }) = monitor {
            let _ = kill.send(());
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "interpreter monitor task failed");
            }
        }
        self.inner.pending.close("channel killed");
        self.inner.shutdown.notify_one();
    }

    /// Whether the channel can no longer deliver new responses
    pub fn is_closed(&self) -> bool {
        self.inner.pending.is_closed()
    }

    /// Number of commands sent so far
    pub fn commands_sent(&self) -> u64 {
        self.inner
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next_id
    }

    /// Whether the interpreter echoes inbound lines
    pub fn debug(&self) -> bool {
        self.inner.debug
    }

    /// Whether two handles refer to the same channel
    pub fn same_channel(&self, other: &Channel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("commands_sent", &self.commands_sent())
            .field("closed", &self.is_closed())
            .field("debug", &self.inner.debug)
            .finish()
    }
}

/// Read one line, replacing invalid UTF-8; `None` at end of stream
async fn next_line<R>(reader: &mut BufReader<R>, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

async fn read_responses<R>(reader: R, pending: Arc<PendingTable>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    let reason = loop {
        match next_line(&mut reader, &mut buf).await {
            Ok(Some(line)) if line.is_empty() => continue,
            Ok(Some(line)) => match Response::parse_line(&line) {
                Ok(response) => {
                    tracing::trace!(id = %response.id, status = %response.status, "received response");
                    pending.insert(response);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "dropping malformed response line");
                }
            },
            Ok(None) => break "interpreter closed its output".to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read from interpreter");
                break format!("failed to read from interpreter: {e}");
            }
        }
    };

    pending.close(reason);
}

async fn write_commands<W>(
    writer: W,
    mut rx: mpsc::UnboundedReceiver<String>,
    pending: Arc<PendingTable>,
    shutdown: Arc<Notify>,
) where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);

    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.notified() => break,
            line = rx.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };

        if let Err(e) = write_batch(&mut writer, &line, &mut rx).await {
            tracing::warn!(error = %e, "failed to write to interpreter");
            pending.close(format!("failed to write to interpreter: {e}"));
            break;
        }
    }

    let _ = writer.shutdown().await;
}

/// Write `first` and everything already queued behind it, then flush once
async fn write_batch<W>(
    writer: &mut BufWriter<W>,
    first: &str,
    rx: &mut mpsc::UnboundedReceiver<String>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(first.as_bytes()).await?;
    while let Ok(line) = rx.try_recv() {
        writer.write_all(line.as_bytes()).await?;
    }
    writer.flush().await
}

fn spawn_stderr_task(stderr: ChildStderr, sink: Option<StderrCallback>) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        while let Ok(Some(line)) = next_line(&mut reader, &mut buf).await {
            match &sink {
                Some(callback) => callback(&line),
                None => tracing::warn!(target: "hopi::interpreter", "{}", line),
            }
        }
    });
}

/// Wait for the interpreter to exit on its own or for a kill request
///
/// A natural exit leaves closing to the reader so responses still buffered in
/// the pipe are delivered.
async fn watch_process(mut child: Child, kill: oneshot::Receiver<()>, pending: Arc<PendingTable>) {
    tokio::select! {
        status = child.wait() => match status {
            Ok(status) => tracing::debug!(%status, "interpreter exited"),
            Err(e) => tracing::warn!(error = %e, "failed to wait for interpreter"),
        },
        _ = kill => {
            pending.close("channel killed");
            if let Err(e) = child.kill().await {
                tracing::warn!(error = %e, "failed to kill interpreter");
            }
            tracing::debug!("interpreter killed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hopi_protocol::Status;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, duplex};
    use tokio_test::{assert_pending, assert_ready};

    /// Channel wired to in-memory pipes; returns the interpreter's ends
    fn wired() -> (
        Channel,
        tokio::io::Lines<BufReader<tokio::io::DuplexStream>>,
        tokio::io::DuplexStream,
    ) {
        let (host_out, remote_in) = duplex(64 * 1024);
        let (remote_out, host_in) = duplex(64 * 1024);
        let channel = Channel::from_io(host_in, host_out);
        (channel, BufReader::new(remote_in).lines(), remote_out)
    }

    #[tokio::test]
    async fn test_send_frames_lines_with_increasing_ids() {
        let (channel, mut commands, _remote_out) = wired();

        assert_eq!(channel.send(CommandKind::Exec, "a = 1").unwrap(), RequestId::new(0));
        assert_eq!(channel.send(CommandKind::Eval, "a").unwrap(), RequestId::new(1));

        assert_eq!(commands.next_line().await.unwrap().unwrap(), "0=EXEC=a = 1");
        assert_eq!(commands.next_line().await.unwrap().unwrap(), "1=EVAL=a");
        assert_eq!(channel.commands_sent(), 2);
    }

    #[tokio::test]
    async fn test_send_rejects_line_breaks() {
        let (channel, _commands, _remote_out) = wired();
        let err = channel.send(CommandKind::Exec, "a = 1\nb = 2").unwrap_err();
        assert!(matches!(err, ChannelError::InvalidCommand(_)));
        assert_eq!(channel.commands_sent(), 0);
    }

    #[tokio::test]
    async fn test_responses_correlate_out_of_order() {
        let (channel, _commands, mut remote_out) = wired();
        let first = channel.send(CommandKind::Eval, "1").unwrap();
        let second = channel.send(CommandKind::Eval, "2").unwrap();

        remote_out.write_all(b"1=PASS=two\n0=PASS=one\n").await.unwrap();

        let (a, b) = tokio::join!(channel.receive(first), channel.receive(second));
        assert_eq!(a.unwrap().payload, "one");
        assert_eq!(b.unwrap().payload, "two");
    }

    #[tokio::test]
    async fn test_waiter_suspends_until_response() {
        let (channel, _commands, mut remote_out) = wired();
        let id = channel.send(CommandKind::Eval, "x").unwrap();

        let mut waiter = tokio_test::task::spawn(channel.receive(id));
        assert_pending!(waiter.poll());

        remote_out.write_all(b"0=PASS=1\n").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert!(waiter.is_woken());
        let response = assert_ready!(waiter.poll()).unwrap();
        assert_eq!(response.status, Status::Pass);
    }

    #[tokio::test]
    async fn test_fail_status_is_remote_execution() {
        let (channel, _commands, mut remote_out) = wired();
        remote_out
            .write_all(b"0=FAIL=NameError(\"name 'nope' is not defined\")\n")
            .await
            .unwrap();

        let err = channel
            .send_and_receive(CommandKind::Eval, "nope")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ChannelError::RemoteExecution("NameError(\"name 'nope' is not defined\")".to_string())
        );
    }

    #[tokio::test]
    async fn test_malformed_line_does_not_stop_reader() {
        let (channel, _commands, mut remote_out) = wired();
        let id = channel.send(CommandKind::Eval, "1").unwrap();

        remote_out
            .write_all(b"this is not a response\n0=PASS=1\n")
            .await
            .unwrap();

        assert_eq!(channel.receive_payload(id).await.unwrap(), "1");
        assert!(!channel.is_closed());
    }

    #[tokio::test]
    async fn test_kill_fails_outstanding_request() {
        let (channel, _commands, _remote_out) = wired();
        let id = channel.send(CommandKind::Eval, "never answered").unwrap();

        let waiter = tokio::spawn({
            let channel = channel.clone();
            async move { channel.receive(id).await }
        });
        tokio::task::yield_now().await;

        channel.kill().await;

        let err = waiter.await.unwrap().unwrap_err();
        assert!(err.is_transport());
        assert!(channel.is_closed());
        assert!(channel.send(CommandKind::Eval, "1").unwrap_err().is_transport());
    }

    #[tokio::test]
    async fn test_eof_closes_channel() {
        let (channel, _commands, remote_out) = wired();
        let id = channel.send(CommandKind::Eval, "1").unwrap();
        drop(remote_out);

        let err = channel.receive(id).await.unwrap_err();
        assert_eq!(
            err,
            ChannelError::Closed("interpreter closed its output".to_string())
        );
    }
}
