//! Shared harness for queue integration tests.
//!
//! [`Harness`] writes fake `ffmpeg` and `ffprobe` shell scripts into a temp
//! directory. Every fake ffmpeg run appends its arguments to a launch log so
//! tests can tell which jobs actually started a process.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::broadcast;

use bf_av::ToolPaths;
use bf_core::config::QueueConfig;
use bf_core::{JobId, JobRequest, JobStatus, JobUpdate};
use bf_queue::JobQueue;

/// How long any single wait in a test may take.
pub const WAIT: Duration = Duration::from_secs(15);

/// ffprobe reporting a 10 second source.
pub const PROBE_TEN_SECONDS: &str = "echo 10.000000";

/// ffprobe that hangs long past any test's patience.
pub const FFPROBE_HANGS: &str = "exec sleep 8";

/// ffprobe that cannot read the source.
pub const PROBE_FAILS: &str = "echo 'clip.mov: Invalid data found' >&2\nexit 1";

/// ffmpeg that creates its output, reports half way, then the end marker.
pub const FFMPEG_OK: &str = r#"for last; do :; done
: > "$last"
printf 'frame=12\nout_time_ms=5000000\nprogress=continue\n'
printf 'out_time_ms=10000000\nprogress=end\n'
exit 0"#;

/// ffmpeg that reports elapsed time only, never the end marker.
pub const FFMPEG_NO_END: &str = r#"for last; do :; done
: > "$last"
printf 'out_time_ms=5000000\nprogress=continue\n'
exit 0"#;

/// ffmpeg that fails after writing diagnostics.
pub const FFMPEG_FAILS: &str = r#"printf 'a\nb\n\n   \nc\nd\n' >&2
exit 1"#;

/// ffmpeg that runs until terminated, then exits cleanly with code 0.
pub const FFMPEG_SLOW: &str = r#"sleep 10 &
child=$!
trap 'kill $child 2>/dev/null; exit 0' TERM
printf 'out_time_ms=1000000\nprogress=continue\n'
wait $child
exit 0"#;

/// ffmpeg that ignores the terminate request.
pub const FFMPEG_STUBBORN: &str = r#"trap '' TERM
printf 'out_time_ms=1000000\nprogress=continue\n'
exec sleep 30"#;

pub struct Harness {
    dir: TempDir,
    pub tools: ToolPaths,
    launch_log: PathBuf,
}

impl Harness {
    pub fn new(ffmpeg_body: &str, ffprobe_body: &str) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let launch_log = dir.path().join("launches.log");

        let ffmpeg = dir.path().join("ffmpeg");
        write_script(
            &ffmpeg,
            &format!(
                "printf '%s\\n' \"$*\" >> '{}'\n{ffmpeg_body}",
                launch_log.display()
            ),
        );
        let ffprobe = dir.path().join("ffprobe");
        write_script(&ffprobe, ffprobe_body);

        Self {
            dir,
            tools: ToolPaths { ffmpeg, ffprobe },
            launch_log,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn queue(&self) -> JobQueue {
        self.queue_with(&QueueConfig::default())
    }

    pub fn queue_with(&self, config: &QueueConfig) -> JobQueue {
        JobQueue::new(self.tools.clone(), config)
    }

    /// A request converting `<id>.mov` to `<id>.mp4` inside the temp dir.
    pub fn request(&self, id: &str) -> JobRequest {
        self.request_to(id, &format!("{id}.mp4"))
    }

    pub fn request_to(&self, id: &str, destination: &str) -> JobRequest {
        JobRequest {
            id: JobId::from(id),
            source: self.path().join(format!("{id}.mov")),
            destination: self.path().join(destination),
            args: vec!["-c:v".into(), "libx264".into()],
            overwrite: false,
        }
    }

    /// Argument lines of every fake ffmpeg launch so far.
    pub fn launches(&self) -> Vec<String> {
        std::fs::read_to_string(&self.launch_log)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

fn write_script(path: &Path, body: &str) {
    std::fs::write(path, format!("#!/bin/sh\n{body}\n")).expect("failed to write script");
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .expect("failed to chmod script");
}

/// Whether this update is the last one a job's invocation will produce.
pub fn is_settled(update: &JobUpdate) -> bool {
    matches!(update.status, Some(JobStatus::Done | JobStatus::Error))
        || update.message.as_deref() == Some("Canceled")
}

/// Wait for the next update matching `pred`.
pub async fn next_matching(
    rx: &mut broadcast::Receiver<JobUpdate>,
    pred: impl Fn(&JobUpdate) -> bool,
) -> JobUpdate {
    tokio::time::timeout(WAIT, async {
        loop {
            let update = rx.recv().await.expect("update channel closed");
            if pred(&update) {
                return update;
            }
        }
    })
    .await
    .expect("timed out waiting for update")
}

/// Collect every update for `id` up to and including its settling update.
pub async fn collect_until_settled(
    rx: &mut broadcast::Receiver<JobUpdate>,
    id: &str,
) -> Vec<JobUpdate> {
    tokio::time::timeout(WAIT, async {
        let mut updates = Vec::new();
        loop {
            let update = rx.recv().await.expect("update channel closed");
            if update.id.as_str() != id {
                continue;
            }
            let settled = is_settled(&update);
            updates.push(update);
            if settled {
                return updates;
            }
        }
    })
    .await
    .expect("timed out waiting for job to settle")
}

/// Progress values (`None` = cleared) in the order they were published.
pub fn progress_values(updates: &[JobUpdate]) -> Vec<Option<f64>> {
    updates.iter().filter_map(|u| u.progress).collect()
}

/// Progress as an observer holding the folded record sees it after each
/// update.
pub fn folded_progress(updates: &[JobUpdate]) -> Vec<Option<f64>> {
    let mut current = None;
    updates
        .iter()
        .map(|u| {
            if let Some(progress) = u.progress {
                current = progress;
            }
            current
        })
        .collect()
}

/// Index of the update that moved the job to `running`.
pub fn running_index(updates: &[JobUpdate]) -> usize {
    updates
        .iter()
        .position(|u| u.status == Some(JobStatus::Running))
        .expect("job never ran")
}

/// Statuses in the order they were published.
pub fn statuses(updates: &[JobUpdate]) -> Vec<JobStatus> {
    updates.iter().filter_map(|u| u.status).collect()
}
