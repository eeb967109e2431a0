//! External toolchain resolution and invocation.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Default locations for the required external binaries.
pub const DEFAULT_INFORM7: &str = "/usr/libexec/ni";
pub const DEFAULT_INFORM6: &str = "/usr/libexec/inform6";
pub const DEFAULT_FROTZ: &str = "/usr/bin/dfrotz";
pub const DEFAULT_INTERNAL: &str = "/usr/share/inform7/Internal";

/// Resolved paths to the external compiler chain and interpreter.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// The `ni` Inform 7 compiler.
    pub inform7: PathBuf,
    /// The `inform6` assembler/linker.
    pub inform6: PathBuf,
    /// The dumb-mode Frotz interpreter.
    pub frotz: PathBuf,
    /// The Inform 7 internal data directory.
    pub internal: PathBuf,
}

impl Toolchain {
    /// Resolve and verify all tool paths. Bare names are searched on
    /// `PATH`; paths with separators must exist as files. Failing here is
    /// preferable to failing on the first `story add`.
    pub fn resolve(
        inform7: &Path,
        inform6: &Path,
        frotz: &Path,
        internal: &Path,
    ) -> Result<Self> {
        Ok(Self {
            inform7: lookup(inform7).context("Inform 7 compiler not found")?,
            inform6: lookup(inform6).context("Inform 6 compiler not found")?,
            frotz: lookup(frotz).context("Frotz interpreter not found")?,
            internal: internal.to_path_buf(),
        })
    }
}

/// Resolve a tool path like a shell would: explicit paths are checked
/// directly, bare names are searched in each `PATH` directory.
fn lookup(tool: &Path) -> Result<PathBuf> {
    if tool.components().count() > 1 {
        if tool.is_file() {
            return Ok(tool.to_path_buf());
        }
        bail!("no executable at {}", tool.display());
    }

    let path = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(tool);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }

    bail!("'{}' not found on PATH", tool.display());
}

/// Captured result of one tool run.
#[derive(Debug)]
pub struct ToolOutput {
    /// Exit status of the tool.
    pub status: ExitStatus,
    /// Collected stdout lines.
    pub stdout: Vec<String>,
    /// Collected stderr lines.
    pub stderr: Vec<String>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Everything the tool printed, stdout then stderr, as one block.
    pub fn diagnostics(&self) -> String {
        let mut lines = self.stdout.clone();
        lines.extend(self.stderr.iter().cloned());
        lines.join("\n")
    }
}

/// Run an external tool to completion, capturing its output streams.
///
/// The child is spawned with `kill_on_drop`, so cancelling the calling
/// future terminates the tool promptly.
pub async fn run_tool<I, S>(program: &Path, args: I) -> Result<ToolOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn {}", program.display()))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let stdout_task = tokio::spawn(async move {
        let mut lines = Vec::new();
        if let Some(stdout) = stdout {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                lines.push(line);
            }
        }
        lines
    });

    let stderr_task = tokio::spawn(async move {
        let mut lines = Vec::new();
        if let Some(stderr) = stderr {
            let mut reader = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                lines.push(line);
            }
        }
        lines
    });

    let status = child
        .wait()
        .await
        .with_context(|| format!("failed waiting for {}", program.display()))?;

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    Ok(ToolOutput {
        status,
        stdout,
        stderr,
    })
}
