//! Console view of a running batch.
//!
//! The queue only sends partial updates; [`JobBoard`] folds them into a
//! full view per job and decides which changes are worth a line of output.

use std::fmt;
use std::path::PathBuf;

use bf_core::{JobId, JobStatus, JobUpdate};

/// Observer-side copy of one job's state.
#[derive(Debug, Clone, PartialEq)]
pub struct JobView {
    pub id: JobId,
    pub status: JobStatus,
    pub progress: Option<f64>,
    pub resolved_output_path: Option<PathBuf>,
    pub message: String,
    pub error_detail: Option<String>,
    pub invocation_summary: Option<String>,
    /// Last progress decile that was reported.
    reported_step: Option<u8>,
}

impl JobView {
    fn new(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            progress: None,
            resolved_output_path: None,
            message: String::new(),
            error_detail: None,
            invocation_summary: None,
            reported_step: None,
        }
    }
}

/// Jobs in the order they were first seen.
#[derive(Debug, Default)]
pub struct JobBoard {
    jobs: Vec<JobView>,
}

impl JobBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `update` into the board and return the lines to print for it.
    pub fn apply(&mut self, update: &JobUpdate) -> Vec<String> {
        let index = match self.jobs.iter().position(|j| j.id == update.id) {
            Some(index) => index,
            None => {
                self.jobs.push(JobView::new(update.id.clone()));
                self.jobs.len() - 1
            }
        };
        let view = &mut self.jobs[index];
        let mut lines = Vec::new();

        if let Some(status) = update.status {
            if status == JobStatus::Queued {
                // A fresh record; resubmission starts reporting over.
                view.reported_step = None;
            }
            view.status = status;
        }
        if let Some(path) = &update.resolved_output_path {
            view.resolved_output_path = path.clone();
        }
        if let Some(detail) = &update.error_detail {
            view.error_detail = detail.clone();
        }
        if let Some(summary) = &update.invocation_summary {
            view.invocation_summary = summary.clone();
            if let Some(summary) = summary {
                lines.push(format!("[{}] $ {}", view.id, summary));
            }
        }
        if let Some(progress) = update.progress {
            view.progress = progress;
            if let Some(value) = progress {
                let step = (value.clamp(0.0, 1.0) * 10.0).floor() as u8;
                if step > 0 && view.reported_step.map_or(true, |last| step > last) {
                    view.reported_step = Some(step);
                    if step < 10 {
                        lines.push(format!("[{}] {}%", view.id, u32::from(step) * 10));
                    }
                }
            }
        }
        if let Some(message) = &update.message {
            view.message = message.clone();
            lines.push(describe(view));
        }

        lines
    }

    pub fn get(&self, id: &JobId) -> Option<&JobView> {
        self.jobs.iter().find(|j| &j.id == id)
    }

    pub fn jobs(&self) -> &[JobView] {
        &self.jobs
    }

    pub fn summary(&self) -> BoardSummary {
        let mut summary = BoardSummary::default();
        for job in &self.jobs {
            match job.status {
                JobStatus::Done => summary.done += 1,
                JobStatus::Error => summary.failed += 1,
                JobStatus::Canceled => summary.canceled += 1,
                JobStatus::Queued | JobStatus::Running => summary.unfinished += 1,
            }
        }
        summary
    }
}

fn describe(view: &JobView) -> String {
    match view.status {
        JobStatus::Done => match &view.resolved_output_path {
            Some(path) => format!("[{}] {} -> {}", view.id, view.message, path.display()),
            None => format!("[{}] {}", view.id, view.message),
        },
        JobStatus::Error => match &view.error_detail {
            Some(detail) => format!("[{}] {}: {}", view.id, view.message, detail),
            None => format!("[{}] {}", view.id, view.message),
        },
        _ => format!("[{}] {}", view.id, view.message),
    }
}

/// Final tally of a batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BoardSummary {
    pub done: usize,
    pub failed: usize,
    pub canceled: usize,
    pub unfinished: usize,
}

impl BoardSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.canceled == 0 && self.unfinished == 0
    }
}

impl fmt::Display for BoardSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} done, {} failed, {} canceled",
            self.done, self.failed, self.canceled
        )?;
        if self.unfinished > 0 {
            write!(f, ", {} unfinished", self.unfinished)?;
        }
        Ok(())
    }
}
