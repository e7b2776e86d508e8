//! External process execution.
//!
//! Runs collaborator tools (hugo, git, rsync, sendmail) with captured output
//! and a hard timeout. A process that outlives its timeout is killed.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::core::{Error, Result};

/// Result of running a process.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Exit status of the process
    pub status: ExitStatus,

    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Time taken to run
    pub duration: Duration,
}

impl ExecutionResult {
    /// Check if the process succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Get the exit code.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }

    /// Combined output, stderr first, trimmed.
    pub fn output(&self) -> String {
        let mut out = self.stderr.trim().to_string();
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(stdout);
        }
        out
    }
}

/// Process runner with a timeout.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// Maximum run time before the process is killed
    pub timeout: Duration,

    /// Working directory for spawned processes
    pub working_dir: Option<PathBuf>,
}

impl ProcessRunner {
    /// Create a runner with the given timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, working_dir: None }
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Run a program and capture its output.
    ///
    /// A non-zero exit is returned as a result, not an error; see [`Self::check`].
    pub async fn run<I, S>(&self, program: &str, args: I) -> Result<ExecutionResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.run_with_input(program, args, None).await
    }

    /// Run a program, optionally feeding bytes to its stdin.
    pub async fn run_with_input<I, S>(&self, program: &str, args: I, input: Option<&[u8]>) -> Result<ExecutionResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let start = Instant::now();

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(ref dir) = self.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(program, dir = ?self.working_dir, "Spawning process");

        let mut child = cmd.spawn().map_err(|e| Error::ExternalTool {
            tool: program.to_string(),
            code: None,
            output: format!("failed to start: {e}"),
        })?;

        let wait = async {
            if let (Some(bytes), Some(mut stdin)) = (input, child.stdin.take()) {
                stdin.write_all(bytes).await?;
                stdin.shutdown().await?;
            }
            child.wait_with_output().await
        };

        let output = tokio::time::timeout(self.timeout, wait)
            .await
            .map_err(|_| Error::Timeout { operation: program.to_string(), after: self.timeout })??;

        Ok(ExecutionResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration: start.elapsed(),
        })
    }

    /// Run a program and fail with [`Error::ExternalTool`] on a non-zero exit.
    pub async fn check<I, S>(&self, program: &str, args: I) -> Result<ExecutionResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let result = self.run(program, args).await?;
        ensure_success(program, result)
    }

    /// Like [`Self::check`], with bytes fed to stdin.
    pub async fn check_with_input<I, S>(&self, program: &str, args: I, input: &[u8]) -> Result<ExecutionResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let result = self.run_with_input(program, args, Some(input)).await?;
        ensure_success(program, result)
    }
}

fn ensure_success(program: &str, result: ExecutionResult) -> Result<ExecutionResult> {
    if result.success() {
        tracing::debug!(program, duration_ms = result.duration.as_millis() as u64, "Process finished");
        Ok(result)
    } else {
        Err(Error::ExternalTool { tool: program.to_string(), code: result.code(), output: result.output() })
    }
}

/// Recursively copy a directory tree, skipping `.git` at the top level of `src`.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    let walker = walkdir::WalkDir::new(src)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_name() == ".git"));

    for entry in walker {
        let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
