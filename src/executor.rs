//! Runs an approved command through the host shell.
//!
//! A command that fails is not an error here: it comes back as an
//! [`ExecutionResult`] with `succeeded == false` and the error text the model
//! will see on the next turn. Only a shell that cannot be started at all is
//! reported as [`HowError::ExecutorFault`].
//!
//! Output is read in fixed-size pieces rather than lines, so a prompt with no
//! trailing newline (`rm -i`, `read -p`) shows up before the child blocks on
//! input.

use crate::error::{HowError, Result};
use async_trait::async_trait;
use std::io::Write;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{info, warn};

/// Retained bytes per output stream. Output past this is still drained and
/// echoed, but not kept.
pub const MAX_CAPTURE_BYTES: usize = 64 * 1024;

const TRUNCATED_MARKER: &str = "[output truncated]";

/// Result of one execution attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Whether the command succeeded.
    pub succeeded: bool,
    /// Standard output fragments, in arrival order. Display only.
    pub stdout_chunks: Vec<String>,
    /// Standard error fragments and process-level errors, in arrival order.
    pub error_chunks: Vec<String>,
}

impl ExecutionResult {
    pub fn success(stdout_chunks: Vec<String>) -> Self {
        Self {
            succeeded: true,
            stdout_chunks,
            error_chunks: Vec::new(),
        }
    }

    pub fn failure(error_chunks: Vec<String>) -> Self {
        Self {
            succeeded: false,
            stdout_chunks: Vec::new(),
            error_chunks,
        }
    }

    /// Error text split into lines, trailing whitespace trimmed and blank
    /// lines dropped. Fragments are joined first, so a line split across
    /// two reads comes back whole.
    pub fn errors(&self) -> Vec<String> {
        self.error_chunks
            .concat()
            .lines()
            .map(|line| line.trim_end().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }
}

#[async_trait]
pub trait ShellExecutor: Send + Sync {
    /// Runs `command` to completion.
    async fn execute(&self, command: &str) -> Result<ExecutionResult>;
}

/// Executes commands as `<shell> -c <command>` on tokio's process API.
///
/// # Example
///
/// ```ignore
/// let executor = SystemShellExecutor::from_env(true);
/// let result = executor.execute("ls -la").await?;
/// assert!(result.succeeded);
/// ```
pub struct SystemShellExecutor {
    shell: String,
    flag: &'static str,
    echo_output: bool,
}

impl SystemShellExecutor {
    /// Uses `$SHELL`, or `sh` when unset. On Windows, `cmd /C`.
    ///
    /// With `echo_output`, output is written to the terminal as it arrives.
    pub fn from_env(echo_output: bool) -> Self {
        if cfg!(windows) {
            return Self {
                shell: "cmd".to_string(),
                flag: "/C",
                echo_output,
            };
        }
        let shell = std::env::var("SHELL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "sh".to_string());
        Self::with_shell(shell, echo_output)
    }

    pub fn with_shell(shell: impl Into<String>, echo_output: bool) -> Self {
        Self {
            shell: shell.into(),
            flag: "-c",
            echo_output,
        }
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }
}

#[async_trait]
impl ShellExecutor for SystemShellExecutor {
    async fn execute(&self, command: &str) -> Result<ExecutionResult> {
        if which::which(&self.shell).is_err() {
            return Err(HowError::ExecutorFault(format!("shell '{}' not found", self.shell)));
        }

        info!("Executing with {}: {}", self.shell, command);

        let spawned = Command::new(&self.shell)
            .arg(self.flag)
            .arg(command)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        // The spawned program is always the shell, so every spawn error is a fault.
        let mut child = spawned.map_err(|e| HowError::ExecutorFault(format!("{}: {}", self.shell, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HowError::ExecutorFault("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| HowError::ExecutorFault("stderr was not captured".to_string()))?;

        let echo = self.echo_output;
        let stdout_task = tokio::spawn(collect_chunks(stdout, echo.then(std::io::stdout)));
        let stderr_task = tokio::spawn(collect_chunks(stderr, echo.then(std::io::stderr)));

        let status = child
            .wait()
            .await
            .map_err(|e| HowError::ExecutorFault(format!("waiting for command: {}", e)))?;

        let stdout_chunks = stdout_task
            .await
            .map_err(|e| HowError::ExecutorFault(e.to_string()))??;
        let mut error_chunks = stderr_task
            .await
            .map_err(|e| HowError::ExecutorFault(e.to_string()))??;

        let succeeded = status.success() && error_chunks.is_empty();
        if !status.success() && error_chunks.is_empty() {
            error_chunks.push(format!("Command exited with {}", status));
        }

        info!("Command finished with {} (succeeded: {})", status, succeeded);

        Ok(ExecutionResult {
            succeeded,
            stdout_chunks,
            error_chunks,
        })
    }
}

/// Size of each read from a child's pipe.
const READ_BUFFER_BYTES: usize = 8 * 1024;

/// Drains `reader` until EOF, echoing each read to `sink` as soon as it
/// arrives and keeping at most [`MAX_CAPTURE_BYTES`] of it.
async fn collect_chunks<R, W>(mut reader: R, mut sink: Option<W>) -> Result<Vec<String>>
where
    R: AsyncRead + Unpin,
    W: Write,
{
    let mut capture = Capture::default();
    let mut buf = [0u8; READ_BUFFER_BYTES];

    loop {
        let read = reader.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        let bytes = &buf[..read];

        if let Some(out) = sink.as_mut() {
            if let Err(e) = out.write_all(bytes).and_then(|_| out.flush()) {
                warn!("Could not echo command output: {}", e);
            }
        }

        capture.push(bytes);
    }

    Ok(capture.finish())
}

/// Bounded capture of one output stream.
///
/// Bytes are decoded as they come in. A multi-byte character split across
/// two reads is held back until the rest of it arrives.
#[derive(Debug, Default)]
struct Capture {
    chunks: Vec<String>,
    retained: usize,
    truncated: bool,
    pending: Vec<u8>,
}

impl Capture {
    fn push(&mut self, bytes: &[u8]) {
        if self.truncated {
            return;
        }

        let room = MAX_CAPTURE_BYTES - self.retained;
        let kept = &bytes[..bytes.len().min(room)];
        self.retained += kept.len();
        self.pending.extend_from_slice(kept);

        if kept.len() < bytes.len() {
            self.truncated = true;
            self.flush_pending();
            self.chunks.push(format!("\n{}\n", TRUNCATED_MARKER));
        } else {
            self.flush_complete();
        }
    }

    /// Moves every complete character out of `pending`.
    fn flush_complete(&mut self) {
        let complete = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        if complete == 0 {
            return;
        }
        let rest = self.pending.split_off(complete);
        let done = std::mem::replace(&mut self.pending, rest);
        self.chunks.push(String::from_utf8_lossy(&done).into_owned());
    }

    fn flush_pending(&mut self) {
        if !self.pending.is_empty() {
            let done = std::mem::take(&mut self.pending);
            self.chunks.push(String::from_utf8_lossy(&done).into_owned());
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush_pending();
        self.chunks
    }
}
