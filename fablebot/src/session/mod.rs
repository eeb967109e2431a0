//! Live interpreter sessions.
//!
//! A session materializes a compiled story file into its own temp
//! directory, runs a dumb-mode Frotz interpreter over three pipes, and
//! mediates line-oriented request/response against it. The interpreter has
//! no output framing, so drains rely on a settle-timeout heuristic: read
//! until a short read, end-of-stream, or an idle window with no bytes.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tempfile::TempDir;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;

/// Default idle window after which a drain considers the interpreter
/// settled. A heuristic, not a protocol guarantee.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(10);

/// Fixed interpreter flags: keystroke-less line input, no status line, and
/// restricted file access (the `-R` path argument follows).
const FROTZ_ARGS: &[&str] = &["-r", "lt", "-r", "cm", "-r", "ch1", "-p", "-m", "-R"];

/// Inputs refused outright rather than forwarded. Save-state handling and
/// transcripts are not implemented, and quitting is reserved for
/// `story end`.
const DISABLED_INPUTS: &[&str] = &["save", "restore", "quit", "\\x", "script", "unscript"];

/// Single-character cursor and function-key codes the interpreter
/// understands; these pass through even though they start with the
/// meta-command character.
const PASSTHROUGH_KEYS: &[&str] = &[
    "\\<", "\\>", "\\^", "\\.", // cursor motion
    "\\1", "\\2", "\\3", "\\4", "\\5", "\\6", "\\7", "\\8", "\\9", "\\0", // F1..F10
    "\\n", "\\u", // hot-keys
];

/// The interpreter's own meta-command character.
const META_PREFIX: char = '\\';

/// Prompt marker the interpreter appends after each response.
const PROMPT_MARKER: &[u8] = b"\n>";

/// Read buffer size for pipe drains; a full buffer means more data may be
/// pending.
const DRAIN_CHUNK: usize = 1024;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Input on the denylist. User-facing, not an operator fault.
    #[error("'{0}' is disabled in chat sessions")]
    Disabled(String),

    /// Backslash-prefixed input that is not a known key code.
    #[error("interpreter meta-commands are disabled")]
    MetaCommand,

    #[error("could not write the story file for the session")]
    Materialize(#[source] std::io::Error),

    #[error("could not start the interpreter")]
    Spawn(#[source] std::io::Error),

    /// The interpreter wrote to its diagnostic stream.
    #[error("the interpreter reported: {0}")]
    Diagnostics(String),

    /// End-of-stream on a pipe: the interpreter process is gone.
    #[error("the interpreter has exited")]
    Exited,

    #[error("session pipe failure")]
    Pipe(#[source] std::io::Error),

    /// Operation on a session after `close`.
    #[error("the session is closed")]
    Closed,
}

/// One live run of a compiled story against an interpreter process.
///
/// Owns the child process, its three pipes, and the temp directory holding
/// the materialized story file; all are released by `close` (or on drop,
/// via `kill_on_drop` and `TempDir`).
pub struct Session {
    story_name: String,
    workdir: TempDir,
    story_path: PathBuf,
    settle: Duration,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
}

impl Session {
    /// Write compiled story bytes into a fresh working directory, ready to
    /// start.
    pub fn materialize(
        story_name: &str,
        build: &[u8],
        settle: Duration,
    ) -> Result<Self, SessionError> {
        let workdir = tempfile::Builder::new()
            .prefix("fablebot-session-")
            .tempdir()
            .map_err(SessionError::Materialize)?;

        let story_path = workdir.path().join("story.z8");
        std::fs::write(&story_path, build).map_err(SessionError::Materialize)?;

        Ok(Self {
            story_name: story_name.to_string(),
            workdir,
            story_path,
            settle: if settle.is_zero() { DEFAULT_SETTLE } else { settle },
            child: None,
            stdin: None,
            stdout: None,
            stderr: None,
        })
    }

    /// Name of the story this session is running.
    pub fn story_name(&self) -> &str {
        &self.story_name
    }

    /// Spawn the interpreter and attach its pipes. The diagnostic stream is
    /// drained once after spawn; the interpreter reports fatal setup errors
    /// there immediately, so any content is a start failure.
    pub async fn start(&mut self, frotz: &Path) -> Result<(), SessionError> {
        let mut child = Command::new(frotz)
            .args(FROTZ_ARGS)
            .arg(self.workdir.path())
            .arg(&self.story_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SessionError::Spawn)?;

        self.stdin = child.stdin.take();
        self.stdout = child.stdout.take();
        self.stderr = child.stderr.take();
        if self.stdin.is_none() || self.stdout.is_none() || self.stderr.is_none() {
            let _ = child.start_kill();
            return Err(SessionError::Spawn(std::io::Error::other(
                "interpreter pipes could not be attached",
            )));
        }

        self.child = Some(child);
        self.check_diagnostics().await
    }

    /// Forward one line of gameplay input to the interpreter.
    ///
    /// Denylisted inputs fail before anything reaches the process. After a
    /// successful write the diagnostic stream is drained; any content
    /// becomes an error.
    pub async fn run(&mut self, input: &str) -> Result<(), SessionError> {
        let lowered = input.to_lowercase();
        if DISABLED_INPUTS.contains(&lowered.as_str()) {
            return Err(SessionError::Disabled(input.to_string()));
        }
        if !PASSTHROUGH_KEYS.contains(&lowered.as_str()) && lowered.starts_with(META_PREFIX) {
            return Err(SessionError::MetaCommand);
        }

        let stdin = self.stdin.as_mut().ok_or(SessionError::Closed)?;
        stdin
            .write_all(format!("{input}\n").as_bytes())
            .await
            .map_err(|_| SessionError::Exited)?;
        stdin.flush().await.map_err(|_| SessionError::Exited)?;

        self.check_diagnostics().await
    }

    /// Drain and return the interpreter's pending output, with the trailing
    /// prompt marker stripped. The only place gameplay text is produced.
    pub async fn output(&mut self) -> Result<String, SessionError> {
        let stdout = self.stdout.as_mut().ok_or(SessionError::Closed)?;
        let mut buf = drain(stdout, self.settle).await?;

        if buf.ends_with(PROMPT_MARKER) {
            buf.truncate(buf.len() - PROMPT_MARKER.len());
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Terminate the interpreter and release its handles. Idempotent.
    pub async fn close(&mut self) {
        self.stdin = None;
        self.stdout = None;
        self.stderr = None;

        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
        }
    }

    /// Drain the diagnostic stream; non-empty content is an error joining
    /// the diagnostic lines with `": "`.
    async fn check_diagnostics(&mut self) -> Result<(), SessionError> {
        let stderr = self.stderr.as_mut().ok_or(SessionError::Closed)?;
        let buf = drain(stderr, self.settle).await?;
        if buf.is_empty() {
            return Ok(());
        }

        let text = String::from_utf8_lossy(&buf);
        let joined = text
            .lines()
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(": ");
        Err(SessionError::Diagnostics(joined))
    }
}

/// Read whatever the pipe has to offer right now.
///
/// Accumulates until a read comes back shorter than the buffer (no more
/// data immediately available) or the settle window passes with no bytes.
/// End-of-stream with nothing buffered means the process died.
async fn drain(
    pipe: &mut (impl AsyncRead + Unpin),
    settle: Duration,
) -> Result<Vec<u8>, SessionError> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; DRAIN_CHUNK];

    loop {
        match timeout(settle, pipe.read(&mut chunk)).await {
            // Idle window passed with no bytes: the interpreter settled.
            Err(_) => break,
            Ok(Ok(0)) => {
                if buf.is_empty() {
                    return Err(SessionError::Exited);
                }
                break;
            }
            Ok(Ok(n)) => {
                buf.extend_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    break;
                }
            }
            Ok(Err(e)) => return Err(SessionError::Pipe(e)),
        }
    }

    Ok(buf)
}
