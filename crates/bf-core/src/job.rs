//! Job data model and lifecycle rules.
//!
//! A [`JobRequest`] is what a caller submits; a [`Job`] is the queue-owned
//! record that tracks that request through
//! `queued -> running -> {done | error | canceled}`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::events::JobUpdate;

/// Caller-assigned job identifier, unique within a queue's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Create an identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A conversion request as submitted by the caller. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub id: JobId,
    /// Source file handed to ffmpeg via `-i`.
    pub source: PathBuf,
    /// Desired destination; collision avoidance may pick a different one.
    pub destination: PathBuf,
    /// Pass-through ffmpeg arguments, placed between the input and output.
    #[serde(default)]
    pub args: Vec<String>,
    /// Overwrite an existing destination instead of picking a fresh name.
    #[serde(default)]
    pub overwrite: bool,
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
    Canceled,
}

impl JobStatus {
    /// Whether no further status transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error | JobStatus::Canceled)
    }

    /// Whether moving from `self` to `next` is an edge of the lifecycle.
    ///
    /// Staying in the same status is not a transition and returns `false`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Queued, Running) | (Queued, Canceled) | (Running, Done | Error | Canceled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
            JobStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue-owned record of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub request: JobRequest,
    pub status: JobStatus,
    /// Fraction in `[0, 1]`, or `None` when not meaningful.
    pub progress: Option<f64>,
    /// Destination after collision avoidance; set once the job starts.
    pub resolved_output_path: Option<PathBuf>,
    pub message: String,
    /// Condensed diagnostic text; only present in the `error` state.
    pub error_detail: Option<String>,
    /// Displayable reconstruction of the ffmpeg command line.
    pub invocation_summary: Option<String>,
}

impl Job {
    /// A freshly submitted job: `queued` with progress 0.
    pub fn queued(request: JobRequest) -> Self {
        Self {
            request,
            status: JobStatus::Queued,
            progress: Some(0.0),
            resolved_output_path: None,
            message: "Queued".to_string(),
            error_detail: None,
            invocation_summary: None,
        }
    }

    pub fn id(&self) -> &JobId {
        &self.request.id
    }

    /// The update describing this record in full, as emitted on submission.
    pub fn snapshot(&self) -> JobUpdate {
        JobUpdate {
            id: self.request.id.clone(),
            status: Some(self.status),
            progress: Some(self.progress),
            resolved_output_path: Some(self.resolved_output_path.clone()),
            message: Some(self.message.clone()),
            error_detail: Some(self.error_detail.clone()),
            invocation_summary: Some(self.invocation_summary.clone()),
        }
    }

    /// Apply the fields present in `changes` and return an update holding
    /// only the fields whose value actually changed.
    ///
    /// Returns `None` when nothing changed. The id of `changes` is ignored.
    pub fn apply(&mut self, changes: JobUpdate) -> Option<JobUpdate> {
        let mut applied = JobUpdate::new(self.request.id.clone());

        if let Some(status) = changes.status {
            if status != self.status {
                self.status = status;
                applied.status = Some(status);
            }
        }
        if let Some(progress) = changes.progress {
            let progress = progress.map(|p| p.clamp(0.0, 1.0));
            if progress != self.progress {
                self.progress = progress;
                applied.progress = Some(progress);
            }
        }
        if let Some(path) = changes.resolved_output_path {
            if path != self.resolved_output_path {
                self.resolved_output_path = path.clone();
                applied.resolved_output_path = Some(path);
            }
        }
        if let Some(message) = changes.message {
            if message != self.message {
                self.message = message.clone();
                applied.message = Some(message);
            }
        }
        if let Some(detail) = changes.error_detail {
            if detail != self.error_detail {
                self.error_detail = detail.clone();
                applied.error_detail = Some(detail);
            }
        }
        if let Some(summary) = changes.invocation_summary {
            if summary != self.invocation_summary {
                self.invocation_summary = summary.clone();
                applied.invocation_summary = Some(summary);
            }
        }

        (!applied.is_empty()).then_some(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str) -> JobRequest {
        JobRequest {
            id: JobId::from(id),
            source: PathBuf::from("/media/clip.mov"),
            destination: PathBuf::from("/out/clip.mp4"),
            args: vec!["-c:v".into(), "libx264".into()],
            overwrite: false,
        }
    }

    #[test]
    fn lifecycle_edges() {
        use JobStatus::*;
        assert!(Queued.can_transition_to(Running));
        assert!(Queued.can_transition_to(Canceled));
        assert!(Running.can_transition_to(Done));
        assert!(Running.can_transition_to(Error));
        assert!(Running.can_transition_to(Canceled));

        assert!(!Queued.can_transition_to(Done));
        assert!(!Queued.can_transition_to(Error));
        assert!(!Running.can_transition_to(Queued));
        for terminal in [Done, Error, Canceled] {
            assert!(terminal.is_terminal());
            for next in [Queued, Running, Done, Error, Canceled] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(!Running.can_transition_to(Running));
    }

    #[test]
    fn queued_job_defaults() {
        let job = Job::queued(request("a"));
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, Some(0.0));
        assert!(job.resolved_output_path.is_none());
        assert!(job.error_detail.is_none());
        assert_eq!(job.id().as_str(), "a");
    }

    #[test]
    fn apply_reports_only_changed_fields() {
        let mut job = Job::queued(request("a"));
        let mut changes = JobUpdate::new("a");
        changes.status = Some(JobStatus::Running);
        changes.progress = Some(Some(0.0));
        changes.message = Some("Starting".into());

        let applied = job.apply(changes).unwrap();
        assert_eq!(applied.status, Some(JobStatus::Running));
        assert_eq!(applied.progress, None);
        assert_eq!(applied.message.as_deref(), Some("Starting"));
        assert_eq!(job.status, JobStatus::Running);
    }

    #[test]
    fn apply_without_changes_is_none() {
        let mut job = Job::queued(request("a"));
        let mut changes = JobUpdate::new("a");
        changes.status = Some(JobStatus::Queued);
        changes.message = Some("Queued".into());
        assert!(job.apply(changes).is_none());
    }

    #[test]
    fn apply_clamps_progress_and_clears() {
        let mut job = Job::queued(request("a"));
        let mut changes = JobUpdate::new("a");
        changes.progress = Some(Some(1.7));
        job.apply(changes);
        assert_eq!(job.progress, Some(1.0));

        let mut changes = JobUpdate::new("a");
        changes.progress = Some(None);
        let applied = job.apply(changes).unwrap();
        assert_eq!(applied.progress, Some(None));
        assert_eq!(job.progress, None);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&JobStatus::Canceled).unwrap(), "\"canceled\"");
        assert_eq!(JobStatus::Running.to_string(), "running");
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let req: JobRequest = serde_json::from_str(
            r#"{"id":"x","source":"in.mov","destination":"out.mp4"}"#,
        )
        .unwrap();
        assert!(req.args.is_empty());
        assert!(!req.overwrite);
        assert_eq!(req.id, JobId::from("x"));
    }
}
