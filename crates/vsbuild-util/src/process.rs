//! Process execution helpers for vsbuild.

use std::fmt;
use std::io::{ErrorKind, Read};
use std::process::{Command, Stdio};
use std::thread;

use crate::error::UtilError;

/// Structured output from a command execution.
#[derive(Debug)]
pub struct CommandOutput {
    /// Standard output as a string.
    pub stdout: String,
    /// Standard error as a string.
    pub stderr: String,
    /// Whether the command exited successfully.
    pub success: bool,
    /// The exit code, if the process was not killed by a signal.
    pub exit_code: Option<i32>,
}

/// Execute a command and capture its output.
///
/// # Errors
/// Returns an error if the command cannot be spawned (e.g. binary not found).
/// A non-zero exit code is **not** an error; check `CommandOutput::success` instead.
pub fn run_command(cmd: &mut Command) -> Result<CommandOutput, UtilError> {
    let output = cmd
        .output()
        .map_err(|source| UtilError::CommandExec { source })?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        success: output.status.success(),
        exit_code: output.status.code(),
    })
}

/// The pipe a chunk of streamed output arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

const CHUNK_SIZE: usize = 8192;

/// Execute a command, handing its output to `on_output` as it is produced.
///
/// Stdout and stderr are read on separate threads, so `on_output` may be
/// called concurrently and receives chunks that are not aligned to lines.
/// Blocks until the process exits and both pipes are drained.
///
/// Returns the exit code, or `None` if the process was killed by a signal.
///
/// # Errors
/// Returns an error if the command cannot be spawned, if `on_output` fails
/// (the rest of that stream is then read and discarded so the process can
/// finish), or if waiting for it fails.
/// A non-zero exit code is **not** an error.
pub fn run_streaming<F>(cmd: &mut Command, on_output: F) -> Result<Option<i32>, UtilError>
where
    F: Fn(OutputStream, &[u8]) -> std::io::Result<()> + Sync,
{
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd
        .spawn()
        .map_err(|source| UtilError::CommandExec { source })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let on_output = &on_output;

    let pumped = thread::scope(|scope| {
        let out = scope.spawn(move || pump(stdout, OutputStream::Stdout, on_output));
        let err = scope.spawn(move || pump(stderr, OutputStream::Stderr, on_output));
        let out = join_reader(out.join(), OutputStream::Stdout);
        let err = join_reader(err.join(), OutputStream::Stderr);
        out.and(err)
    });

    if let Err(e) = pumped {
        // A reader that panicked stopped draining its pipe.
        if let Err(kill_err) = child.kill() {
            tracing::debug!("cannot kill child after output failure: {kill_err}");
        }
        if let Err(wait_err) = child.wait() {
            tracing::debug!("cannot reap child after output failure: {wait_err}");
        }
        return Err(e);
    }

    let status = child
        .wait()
        .map_err(|source| UtilError::CommandWait { source })?;
    Ok(status.code())
}

fn join_reader(
    joined: thread::Result<std::io::Result<()>>,
    stream: OutputStream,
) -> Result<(), UtilError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(UtilError::OutputForward { source }),
        Err(_) => Err(UtilError::OutputReaderPanicked {
            stream: stream.to_string(),
        }),
    }
}

fn pump<R, F>(reader: Option<R>, stream: OutputStream, on_output: &F) -> std::io::Result<()>
where
    R: Read,
    F: Fn(OutputStream, &[u8]) -> std::io::Result<()>,
{
    let Some(mut reader) = reader else {
        return Ok(());
    };
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if let Err(e) = on_output(stream, buf.get(..n).unwrap_or_default()) {
            // Keep the pipe empty so the child never blocks writing to it.
            std::io::copy(&mut reader, &mut std::io::sink())?;
            return Err(e);
        }
    }
}
