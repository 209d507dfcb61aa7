//! Child-process execution with bounded capture and cancellation.
//!
//! Commands are spawned directly (no shell), with `kill_on_drop` so a
//! dropped or cancelled run never leaves the child behind.

use std::fmt;
use std::path::Path;
use std::process::Stdio;

use kat_rules::EnvVar;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{CommandError, Result};

const READ_CHUNK: usize = 8 * 1024;

/// Bytes dropped from each stream after the capture limit was reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Truncation {
    pub stdout_bytes: u64,
    pub stderr_bytes: u64,
}

impl Truncation {
    pub fn is_truncated(&self) -> bool {
        self.stdout_bytes > 0 || self.stderr_bytes > 0
    }

    /// Combine counts from several commands.
    pub fn add(&mut self, other: Truncation) {
        self.stdout_bytes += other.stdout_bytes;
        self.stderr_bytes += other.stderr_bytes;
    }
}

impl fmt::Display for Truncation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stdout bytes and {} stderr bytes dropped",
            self.stdout_bytes, self.stderr_bytes
        )
    }
}

/// What to run and how.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub command: &'a str,
    pub args: &'a [String],
    pub env: &'a [EnvVar],
    pub dir: &'a Path,
    /// Bytes written to the child's stdin, which is then closed. `None`
    /// connects stdin to null.
    pub stdin: Option<&'a [u8]>,
    /// Per-stream capture cap.
    pub limit: usize,
}

impl Invocation<'_> {
    /// `command arg1 arg2 ...` for messages.
    pub fn command_line(&self) -> String {
        std::iter::once(self.command)
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished child process.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code, -1 if terminated by a signal.
    pub exit_code: i32,
    pub truncation: Truncation,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Turn a non-zero exit into [`CommandError::Execution`].
    pub fn check(self, command: String) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(CommandError::Execution {
            command,
            exit_code: self.exit_code,
            stderr: self.stderr_lossy(),
        })
    }
}

/// Spawn the command and wait for it, or kill it when `cancel` fires.
///
/// A non-zero exit is not an error here; see [`Captured::check`].
pub async fn run(inv: Invocation<'_>, cancel: &CancelToken) -> Result<Captured> {
    if inv.command.trim().is_empty() {
        return Err(CommandError::EmptyCommand);
    }
    if cancel.is_cancelled() {
        return Err(CommandError::Canceled);
    }

    let mut cmd = Command::new(inv.command);
    cmd.args(inv.args)
        .current_dir(inv.dir)
        .stdin(if inv.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    for var in inv.env {
        cmd.env(&var.name, &var.value);
    }

    debug!(command = %inv.command_line(), dir = %inv.dir.display(), "spawning command");
    let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
        command: inv.command_line(),
        source,
    })?;

    let stdin = child.stdin.take().zip(inv.stdin);
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let io = async {
        let feed = async move {
            if let Some((mut pipe, data)) = stdin {
                // A child that exits without reading closes the pipe early.
                if let Err(e) = pipe.write_all(data).await {
                    debug!(error = %e, "stdin not fully consumed");
                }
            }
        };
        let (_, out, err, status) = tokio::join!(
            feed,
            read_bounded(stdout, inv.limit),
            read_bounded(stderr, inv.limit),
            child.wait(),
        );
        Ok::<_, std::io::Error>((out?, err?, status?))
    };

    let outcome = tokio::select! {
        res = io => Some(res),
        _ = cancel.cancelled() => None,
    };

    let Some(res) = outcome else {
        if let Err(e) = child.start_kill() {
            warn!(command = %inv.command_line(), error = %e, "failed to kill canceled command");
        }
        debug!(command = %inv.command_line(), "command canceled");
        return Err(CommandError::Canceled);
    };

    let ((stdout, stdout_dropped), (stderr, stderr_dropped), status) = res?;
    let exit_code = status.code().unwrap_or(-1);
    if exit_code != 0 {
        debug!(command = %inv.command_line(), exit_code, "command returned non-zero exit code");
    }
    Ok(Captured {
        stdout,
        stderr,
        exit_code,
        truncation: Truncation {
            stdout_bytes: stdout_dropped,
            stderr_bytes: stderr_dropped,
        },
    })
}

/// Read to EOF keeping at most `limit` bytes; returns the kept bytes and
/// the count of dropped ones.
async fn read_bounded<R>(reader: Option<R>, limit: usize) -> std::io::Result<(Vec<u8>, u64)>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok((Vec::new(), 0));
    };
    let mut kept = Vec::new();
    let mut dropped = 0u64;
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(kept.len()));
        kept.extend_from_slice(&chunk[..keep]);
        dropped += (n - keep) as u64;
    }
    Ok((kept, dropped))
}
