//! Short, fully captured tool runs.
//!
//! Conversions are supervised by the job runner, which streams output while
//! the process runs. This module is for quick queries whose whole output is
//! wanted at once, such as asking ffprobe for a duration.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What a finished run printed.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    /// Lossy UTF-8.
    pub stdout: String,
    /// Lossy UTF-8.
    pub stderr: String,
}

/// A tool invocation that must finish within a deadline.
///
/// ```no_run
/// use bf_av::ToolCommand;
///
/// # async fn example() -> bf_core::Result<()> {
/// let output = ToolCommand::new("ffprobe")
///     .args(["-v", "error", "-show_entries", "format=duration"])
///     .arg("/path/to/clip.mov")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Deadline for the whole run. Defaults to 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn tool_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Run to completion and capture both output streams.
    ///
    /// Spawn failures, non-zero exits and missed deadlines all come back as
    /// [`bf_core::Error::Tool`]. A non-zero exit carries the trimmed stderr.
    pub async fn execute(&self) -> bf_core::Result<ToolOutput> {
        let tool = self.tool_name();

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| bf_core::Error::tool(&tool, format!("failed to spawn: {e}")))?;

        // On timeout the wait future is dropped with the child inside it, and
        // kill_on_drop takes the process down.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| bf_core::Error::tool(&tool, format!("timed out after {:?}", self.timeout)))?
            .map_err(|e| bf_core::Error::tool(&tool, format!("failed waiting for exit: {e}")))?;

        let captured = ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !captured.status.success() {
            return Err(bf_core::Error::tool(
                tool,
                format!(
                    "exited with status {}: {}",
                    captured.status,
                    captured.stderr.trim()
                ),
            ));
        }

        tracing::trace!(tool = %tool, bytes = captured.stdout.len(), "Tool run finished");
        Ok(captured)
    }
}
