//! Worker process supervision.
//!
//! A [`Supervisor`] runs one generated script under the configured
//! interpreter, streams its output line by line to an [`OutputSink`] while
//! keeping a bounded copy, and races the exit against an optional deadline
//! and an [`AbortSignal`]. Timeout and abort kill the child and reap it
//! before returning, so no run leaves a live process behind.

use crate::error::{Result, WorkflowError};
use crate::utils::fmt_elapsed;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt as _, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Bytes of each stream kept in a [`RunResult`].
pub const OUTPUT_CAPTURE_LIMIT: usize = 256 * 1024;

/// Longest line handed to the sink; longer runs of output without a
/// newline are split at this size.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// How long to wait for the output pipes to close after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Lifecycle of one supervised run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum RunState {
    Spawned { pid: Option<u32> },
    Exited { exit_code: Option<i32> },
    Killing { reason: KillReason },
    Reaped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KillReason {
    Timeout,
    Abort,
}

/// Receives worker output as it arrives.
pub trait OutputSink: Send + Sync {
    fn line(&self, stream: Stream, line: &str);

    fn state_changed(&self, _state: &RunState) {}
}

/// Forwards worker output to `tracing`.
#[derive(Debug, Clone)]
pub struct TracingSink {
    pub stage: &'static str,
}

impl OutputSink for TracingSink {
    fn line(&self, stream: Stream, line: &str) {
        match stream {
            Stream::Stdout => tracing::info!(stage = self.stage, "{line}"),
            Stream::Stderr => tracing::warn!(stage = self.stage, "{line}"),
        }
    }

    fn state_changed(&self, state: &RunState) {
        tracing::debug!(stage = self.stage, ?state, "worker state changed");
    }
}

/// Tail of a text stream, capped at `limit` bytes.
#[derive(Debug, Clone)]
pub struct OutputCapture {
    text: String,
    limit: usize,
    truncated: bool,
}

impl OutputCapture {
    pub fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            limit,
            truncated: false,
        }
    }

    pub fn push_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
        if self.text.len() > self.limit {
            let mut cut = self.text.len() - self.limit;
            while !self.text.is_char_boundary(cut) {
                cut += 1;
            }
            self.text.drain(..cut);
            self.truncated = true;
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether earlier output was dropped.
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Cloneable cancellation handle for a run.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`AbortSignal::abort`] has been called.
    pub async fn aborted(&self) {
        let mut rx = self.tx.subscribe();
        if rx.wait_for(|aborted| *aborted).await.is_err() {
            // Unreachable while `self` holds the sender
            std::future::pending::<()>().await;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RunOutcome {
    Succeeded,
    Failed { exit_code: Option<i32> },
    TimedOut { seconds: u64 },
    Aborted,
}

/// What a finished run left behind.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub outcome: RunOutcome,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
    /// Set by the caller once the expected artifact has been verified.
    pub produced_artifact_path: Option<PathBuf>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunResult {
    /// Turn a non-successful outcome into its error.
    ///
    /// # Errors
    ///
    /// `ProcessFailed`, `Timeout` or `Aborted` matching the outcome.
    pub fn into_success(self) -> Result<Self> {
        match self.outcome {
            RunOutcome::Succeeded => Ok(self),
            RunOutcome::Failed { exit_code } => Err(WorkflowError::ProcessFailed {
                exit_code,
                stdout: self.stdout,
                stderr: self.stderr,
            }),
            RunOutcome::TimedOut { seconds } => Err(WorkflowError::Timeout {
                seconds,
                stderr: self.stderr,
            }),
            RunOutcome::Aborted => Err(WorkflowError::Aborted),
        }
    }
}

/// One script invocation.
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub script: &'a Path,
    pub working_dir: &'a Path,
    pub timeout: Option<Duration>,
}

pub struct Supervisor {
    interpreter: PathBuf,
    sink: Arc<dyn OutputSink>,
    capture_limit: usize,
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("interpreter", &self.interpreter)
            .field("capture_limit", &self.capture_limit)
            .finish_non_exhaustive()
    }
}

type SharedCapture = Arc<Mutex<OutputCapture>>;

fn drain<R>(
    reader: R,
    stream: Stream,
    sink: Arc<dyn OutputSink>,
    capture: SharedCapture,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut line = Vec::with_capacity(256);
        loop {
            let chunk = match reader.fill_buf().await {
                Ok(chunk) => chunk,
                Err(err) => {
                    tracing::warn!(stream = stream.as_str(), %err, "failed to read worker output");
                    break;
                }
            };
            if chunk.is_empty() {
                break;
            }

            let room = MAX_LINE_BYTES - line.len();
            let (take, ends_line) = match chunk.iter().position(|b| *b == b'\n') {
                Some(pos) if pos < room => (pos + 1, true),
                _ => (chunk.len().min(room), false),
            };
            line.extend_from_slice(chunk.get(..take).unwrap_or_default());
            reader.consume(take);

            if ends_line || line.len() >= MAX_LINE_BYTES {
                emit_line(&line, stream, sink.as_ref(), &capture);
                line.clear();
            }
        }
        if !line.is_empty() {
            emit_line(&line, stream, sink.as_ref(), &capture);
        }
    })
}

fn emit_line(raw: &[u8], stream: Stream, sink: &dyn OutputSink, capture: &SharedCapture) {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_end_matches(['\n', '\r']);
    sink.line(stream, text);
    capture
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push_line(text);
}

async fn finish_drain(mut handle: JoinHandle<()>, capture: &SharedCapture) -> OutputCapture {
    match tokio::time::timeout(DRAIN_GRACE, &mut handle).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!(%err, "output reader task failed"),
        Err(_elapsed) => {
            // A grandchild still holds the pipe open
            tracing::debug!("output pipe still open after exit, keeping what was read");
            handle.abort();
        }
    }
    capture
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

enum Ending {
    Exited(std::io::Result<std::process::ExitStatus>),
    Kill(KillReason),
}

impl Supervisor {
    pub fn new(interpreter: impl Into<PathBuf>, sink: Arc<dyn OutputSink>) -> Self {
        Self {
            interpreter: interpreter.into(),
            sink,
            capture_limit: OUTPUT_CAPTURE_LIMIT,
        }
    }

    #[must_use]
    pub fn with_capture_limit(mut self, limit: usize) -> Self {
        self.capture_limit = limit;
        self
    }

    pub fn interpreter(&self) -> &Path {
        &self.interpreter
    }

    /// Run `invocation.script` to completion, timeout or abort.
    ///
    /// A non-zero exit is reported in the returned [`RunResult`], not as an
    /// error.
    ///
    /// # Errors
    ///
    /// `SpawnError` when the interpreter cannot be started; `Io` when waiting
    /// on the child fails.
    pub async fn run(&self, invocation: &Invocation<'_>, abort: &AbortSignal) -> Result<RunResult> {
        let started = Instant::now();

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg(invocation.script)
            .current_dir(invocation.working_dir)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::info!(
            interpreter = %self.interpreter.display(),
            script = %invocation.script.display(),
            "spawning worker"
        );
        let mut child = cmd.spawn().map_err(|err| WorkflowError::SpawnError {
            interpreter: self.interpreter.clone(),
            message: err.to_string(),
        })?;
        self.sink.state_changed(&RunState::Spawned { pid: child.id() });

        let stdout_capture: SharedCapture =
            Arc::new(Mutex::new(OutputCapture::new(self.capture_limit)));
        let stderr_capture: SharedCapture =
            Arc::new(Mutex::new(OutputCapture::new(self.capture_limit)));
        let stdout_task = child.stdout.take().map(|out| {
            drain(out, Stream::Stdout, Arc::clone(&self.sink), Arc::clone(&stdout_capture))
        });
        let stderr_task = child.stderr.take().map(|err| {
            drain(err, Stream::Stderr, Arc::clone(&self.sink), Arc::clone(&stderr_capture))
        });

        let deadline = async {
            match invocation.timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };

        let ending = tokio::select! {
            status = child.wait() => Ending::Exited(status),
            () = deadline => Ending::Kill(KillReason::Timeout),
            () = abort.aborted() => Ending::Kill(KillReason::Abort),
        };

        let (outcome, exit_code) = match ending {
            Ending::Exited(status) => {
                let status = status?;
                let exit_code = status.code();
                self.sink.state_changed(&RunState::Exited { exit_code });
                if status.success() {
                    (RunOutcome::Succeeded, exit_code)
                } else {
                    (RunOutcome::Failed { exit_code }, exit_code)
                }
            }
            Ending::Kill(reason) => {
                self.sink.state_changed(&RunState::Killing { reason });
                if let Err(err) = child.start_kill() {
                    tracing::warn!(%err, "failed to signal worker");
                }
                let status = child.wait().await?;
                let outcome = match reason {
                    KillReason::Timeout => RunOutcome::TimedOut {
                        seconds: invocation.timeout.map_or(0, |t| t.as_secs()),
                    },
                    KillReason::Abort => RunOutcome::Aborted,
                };
                (outcome, status.code())
            }
        };
        self.sink.state_changed(&RunState::Reaped);

        let stdout = match stdout_task {
            Some(task) => finish_drain(task, &stdout_capture).await,
            None => OutputCapture::new(0),
        };
        let stderr = match stderr_task {
            Some(task) => finish_drain(task, &stderr_capture).await,
            None => OutputCapture::new(0),
        };

        let elapsed = started.elapsed();
        tracing::info!(?outcome, elapsed = %fmt_elapsed(elapsed), "worker finished");

        Ok(RunResult {
            outcome,
            exit_code,
            stdout_truncated: stdout.truncated(),
            stderr_truncated: stderr.truncated(),
            stdout: stdout.into_text(),
            stderr: stderr.into_text(),
            produced_artifact_path: None,
            elapsed,
        })
    }
}
