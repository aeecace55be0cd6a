//! Supervision of one ffmpeg invocation.
//!
//! The runner resolves the output path, probes the source duration, launches
//! ffmpeg, feeds its stdout through the progress parser and its stderr into a
//! [`DiagnosticLog`], and reduces the exit to a [`RunOutcome`]. It never
//! touches job records; the queue turns events and outcomes into state.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use bf_av::{
    DiagnosticLog, FfmpegInvocation, LineSplitter, PathAllocator, ProbeClient, ProgressParser,
    ToolPaths,
};
use bf_core::config::QueueConfig;
use bf_core::JobRequest;

/// Read buffer size for the child's output pipes.
const READ_CHUNK: usize = 8 * 1024;

/// Something the queue should reflect on the job while it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    /// Collision avoidance picked the destination.
    OutputResolved(PathBuf),
    /// The probe finished; `None` means progress will be indeterminate.
    DurationProbed(Option<u64>),
    /// ffmpeg is about to be spawned with this displayable command line.
    Launching { invocation_summary: String },
    /// Completion advanced to this fraction.
    Progress(f64),
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    /// Launch failure or non-zero exit, with condensed detail.
    Failed { detail: String },
    /// Cancellation was requested; the exit code is irrelevant.
    Canceled,
}

/// Launches and supervises ffmpeg for one job at a time.
#[derive(Debug, Clone)]
pub struct JobRunner {
    ffmpeg: PathBuf,
    probe: ProbeClient,
    allocator: PathAllocator,
    kill_after: Option<Duration>,
}

impl JobRunner {
    pub fn new(tools: ToolPaths, config: &QueueConfig) -> Self {
        Self {
            ffmpeg: tools.ffmpeg,
            probe: ProbeClient::new(tools.ffprobe, config.probe_timeout()),
            allocator: PathAllocator,
            kill_after: config.cancel_kill_after(),
        }
    }

    /// Run `request` to completion.
    ///
    /// `on_event` is called in order as the run progresses and never after
    /// this future resolves. Cancelling `cancel` before launch (including
    /// mid-probe) ends the run at once without launching; afterwards it sends
    /// ffmpeg a terminate request and the run still ends only when the
    /// process exits.
    pub async fn run<F>(
        &self,
        request: &JobRequest,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> RunOutcome
    where
        F: FnMut(RunnerEvent) + Send,
    {
        let job_id = &request.id;

        let output = self
            .allocator
            .allocate(&request.destination, request.overwrite);
        on_event(RunnerEvent::OutputResolved(output.clone()));

        // Dropping the duration lookup kills ffprobe.
        let duration_ms = tokio::select! {
            duration = self.probe.duration_ms(&request.source) => duration,
            _ = cancel.cancelled() => {
                tracing::info!(job_id = %job_id, "Canceled while probing");
                return RunOutcome::Canceled;
            }
        };
        if duration_ms.is_none() {
            tracing::warn!(job_id = %job_id, source = %request.source.display(), "Source duration unknown; progress will be indeterminate");
        }
        on_event(RunnerEvent::DurationProbed(duration_ms));

        if cancel.is_cancelled() {
            tracing::info!(job_id = %job_id, "Canceled before launch");
            return RunOutcome::Canceled;
        }

        let invocation = FfmpegInvocation::new(
            self.ffmpeg.clone(),
            request.source.clone(),
            request.args.clone(),
            output,
            request.overwrite,
        );
        let summary = invocation.summary();
        tracing::info!(job_id = %job_id, command = %summary, "Launching ffmpeg");
        on_event(RunnerEvent::Launching {
            invocation_summary: summary,
        });

        let mut child = match Command::new(invocation.program())
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to launch ffmpeg");
                return RunOutcome::Failed {
                    detail: e.to_string(),
                };
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let mut parser = ProgressParser::new(duration_ms);
        let mut diagnostics = DiagnosticLog::new();

        let progress = pump_lines(stdout, |line| {
            if let Some(fraction) = parser.parse_line(&line) {
                on_event(RunnerEvent::Progress(fraction));
            }
        });
        let diag = pump_lines(stderr, |line| diagnostics.push(&line));
        let exit = wait_for_exit(&mut child, cancel, self.kill_after);

        let ((), (), status) = tokio::join!(progress, diag, exit);

        if cancel.is_cancelled() {
            tracing::info!(job_id = %job_id, "ffmpeg exited after cancellation");
            return RunOutcome::Canceled;
        }

        match status {
            Ok(status) if status.success() => {
                tracing::info!(job_id = %job_id, "ffmpeg finished");
                RunOutcome::Succeeded
            }
            Ok(status) => {
                let detail = diagnostics.failure_detail(&invocation.program_name(), status.code());
                tracing::warn!(job_id = %job_id, detail = %detail, "ffmpeg failed");
                RunOutcome::Failed { detail }
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Lost track of ffmpeg");
                RunOutcome::Failed {
                    detail: format!("failed waiting for {}: {e}", invocation.program_name()),
                }
            }
        }
    }
}

/// Read `reader` to the end, handing each complete line to `on_line`.
async fn pump_lines<R, F>(reader: Option<R>, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(String),
{
    let Some(mut reader) = reader else {
        return;
    };
    let mut splitter = LineSplitter::new();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => splitter.push(&buf[..n]).into_iter().for_each(&mut on_line),
            Err(e) => {
                tracing::debug!(error = %e, "Stopped reading child output");
                break;
            }
        }
    }

    if let Some(line) = splitter.finish() {
        on_line(line);
    }
}

/// Wait for the child, sending a terminate request if `cancel` fires first.
async fn wait_for_exit(
    child: &mut Child,
    cancel: &CancellationToken,
    kill_after: Option<Duration>,
) -> std::io::Result<std::process::ExitStatus> {
    tokio::select! {
        status = child.wait() => return status,
        _ = cancel.cancelled() => {}
    }

    request_termination(child);

    let Some(grace) = kill_after else {
        return child.wait().await;
    };
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            tracing::warn!(
                pid = ?child.id(),
                grace_secs = grace.as_secs(),
                "Process ignored terminate request; killing"
            );
            if let Err(e) = child.start_kill() {
                tracing::warn!(error = %e, "Failed to kill process");
            }
            child.wait().await
        }
    }
}

/// Ask the child to shut down gracefully.
#[cfg(unix)]
fn request_termination(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) => tracing::debug!(pid, "Sent SIGTERM"),
        Err(e) => tracing::warn!(pid, error = %e, "Failed to send SIGTERM"),
    }
}

/// Ask the child to shut down; without signals this is the platform kill.
#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::warn!(error = %e, "Failed to terminate process");
    }
}
