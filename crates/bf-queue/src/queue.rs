//! The job queue: job records, FIFO backlog, and single-slot dispatch.
//!
//! All queue state lives behind one mutex and every mutation publishes its
//! [`JobUpdate`] while the lock is held, so observers see updates in the
//! order they happened. Submission and cancellation never wait on a
//! process; each dispatched job runs in its own Tokio task and re-enters the
//! queue through [`Inner::on_runner_event`] and [`Inner::finish`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use bf_av::ToolPaths;
use bf_core::config::QueueConfig;
use bf_core::{Job, JobId, JobRequest, JobStatus, JobUpdate, UpdateBus};

use crate::runner::{JobRunner, RunOutcome, RunnerEvent};

/// Handle to a single-worker conversion queue.
///
/// Cloning is cheap; clones share the same queue. Methods that dispatch work
/// must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<QueueState>,
    runner: JobRunner,
    updates: UpdateBus,
    idle: watch::Sender<bool>,
}

#[derive(Default)]
struct QueueState {
    jobs: HashMap<JobId, Job>,
    backlog: VecDeque<JobId>,
    active: Option<ActiveJob>,
}

struct ActiveJob {
    id: JobId,
    cancel: CancellationToken,
}

impl JobQueue {
    /// Create a queue that runs jobs with the given tools.
    pub fn new(tools: ToolPaths, config: &QueueConfig) -> Self {
        Self::with_runner(JobRunner::new(tools, config), config.event_capacity)
    }

    /// Create a queue around an already configured runner.
    pub fn with_runner(runner: JobRunner, event_capacity: usize) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                runner,
                updates: UpdateBus::new(event_capacity),
                idle,
            }),
        }
    }

    /// Stage each request as `queued` and start dispatching.
    ///
    /// A request whose id belongs to the job currently running (or still
    /// shutting down after a cancel) is dropped. A request whose id is
    /// already queued replaces that record and moves to the back of the
    /// backlog. Returns how many requests were accepted.
    pub fn submit(&self, requests: impl IntoIterator<Item = JobRequest>) -> usize {
        let mut state = self.inner.state.lock();
        let mut accepted = 0;

        for request in requests {
            let id = request.id.clone();
            if state.active.as_ref().is_some_and(|a| a.id == id) {
                tracing::debug!(job_id = %id, "Ignoring resubmission of running job");
                continue;
            }

            state.backlog.retain(|queued| queued != &id);
            let job = Job::queued(request);
            self.inner.updates.publish(job.snapshot());
            state.jobs.insert(id.clone(), job);
            state.backlog.push_back(id.clone());
            accepted += 1;
            tracing::info!(job_id = %id, "Job queued");
        }

        if accepted > 0 {
            self.inner.dispatch(&mut state);
        }
        accepted
    }

    /// Cancel a queued or running job.
    ///
    /// A queued job is removed from the backlog and becomes `canceled` at
    /// once. The running job becomes `canceled` with message "Canceling" and
    /// its process is asked to terminate; it settles when the process exits.
    /// Returns `false` for unknown or already finished jobs.
    pub fn cancel(&self, id: &JobId) -> bool {
        let mut state = self.inner.state.lock();
        let QueueState {
            jobs,
            backlog,
            active,
        } = &mut *state;

        let Some(job) = jobs.get_mut(id) else {
            return false;
        };

        match job.status {
            JobStatus::Queued => {
                backlog.retain(|queued| queued != id);
                self.inner.mutate(
                    job,
                    JobUpdate::new(id.clone())
                        .with_status(JobStatus::Canceled)
                        .with_progress(None)
                        .with_message("Canceled"),
                );
                tracing::info!(job_id = %id, "Canceled queued job");
                true
            }
            JobStatus::Running => {
                self.inner.mutate(
                    job,
                    JobUpdate::new(id.clone())
                        .with_status(JobStatus::Canceled)
                        .with_message("Canceling"),
                );
                if let Some(active) = active.as_ref().filter(|a| &a.id == id) {
                    active.cancel.cancel();
                }
                tracing::info!(job_id = %id, "Canceling running job");
                true
            }
            _ => false,
        }
    }

    /// Remove finished (`done`, `error`, `canceled`) records that are not
    /// still shutting down. Returns how many were removed.
    pub fn purge_finished(&self) -> usize {
        let mut state = self.inner.state.lock();
        let active_id = state.active.as_ref().map(|a| a.id.clone());
        let before = state.jobs.len();
        state
            .jobs
            .retain(|id, job| !job.status.is_terminal() || Some(id) == active_id.as_ref());
        before - state.jobs.len()
    }

    /// Receive every update published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.inner.updates.subscribe()
    }

    /// Call `handler` for every update published from now on.
    ///
    /// The handler runs on a spawned task that ends when the queue is
    /// dropped.
    pub fn on_update<F>(&self, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut(JobUpdate) + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(update) => handler(update),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Update handler fell behind");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// The most recent `n` updates, newest first.
    pub fn recent_updates(&self, n: usize) -> Vec<JobUpdate> {
        self.inner.updates.recent(n)
    }

    /// Resolve once nothing is running and the backlog is empty.
    pub async fn wait_idle(&self) {
        let mut rx = self.inner.idle.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = rx.wait_for(|idle| *idle).await;
    }
}

impl Inner {
    /// Apply `changes` to `job` and publish whatever actually changed.
    fn mutate(&self, job: &mut Job, changes: JobUpdate) {
        if let Some(status) = changes.status {
            if status != job.status && !job.status.can_transition_to(status) {
                tracing::error!(
                    job_id = %job.id(),
                    from = %job.status,
                    to = %status,
                    "Refusing invalid status transition"
                );
                return;
            }
        }
        if let Some(update) = job.apply(changes) {
            self.updates.publish(update);
        }
    }

    /// Start the next queued job if the worker slot is free.
    fn dispatch(self: &Arc<Self>, state: &mut QueueState) {
        if state.active.is_some() {
            return;
        }

        while let Some(id) = state.backlog.pop_front() {
            let Some(job) = state.jobs.get_mut(&id) else {
                continue;
            };
            if job.status != JobStatus::Queued {
                tracing::debug!(job_id = %id, status = %job.status, "Skipping backlog entry");
                continue;
            }

            self.mutate(
                job,
                // Progress stays absent until the probe yields a duration.
                JobUpdate::new(id.clone())
                    .with_status(JobStatus::Running)
                    .with_progress(None)
                    .with_message("Starting"),
            );
            let request = job.request.clone();
            let cancel = CancellationToken::new();
            state.active = Some(ActiveJob {
                id: id.clone(),
                cancel: cancel.clone(),
            });
            self.idle.send_replace(false);
            tracing::info!(job_id = %id, "Dispatching job");

            let inner = Arc::clone(self);
            tokio::spawn(async move {
                let outcome = inner
                    .runner
                    .run(&request, &cancel, |event| inner.on_runner_event(&request.id, event))
                    .await;
                inner.finish(&request.id, outcome);
            });
            return;
        }

        self.idle.send_replace(true);
    }

    /// Reflect a runner event on the job, unless it was canceled meanwhile.
    fn on_runner_event(&self, id: &JobId, event: RunnerEvent) {
        let mut state = self.state.lock();
        let Some(job) = state.jobs.get_mut(id) else {
            return;
        };

        let changes = match event {
            // The destination is recorded even for a job that is canceling.
            RunnerEvent::OutputResolved(path) => {
                if job.resolved_output_path.is_some() {
                    return;
                }
                JobUpdate::new(id.clone()).with_resolved_output_path(path)
            }
            _ if job.status != JobStatus::Running => return,
            RunnerEvent::DurationProbed(duration) => {
                JobUpdate::new(id.clone()).with_progress(duration.map(|_| 0.0))
            }
            RunnerEvent::Launching { invocation_summary } => JobUpdate::new(id.clone())
                .with_invocation_summary(invocation_summary)
                .with_message("Running"),
            RunnerEvent::Progress(fraction) => {
                if job.progress.is_some_and(|p| fraction <= p) {
                    return;
                }
                JobUpdate::new(id.clone()).with_progress(Some(fraction))
            }
        };
        self.mutate(job, changes);
    }

    /// Settle the job after its run ended and dispatch the next one.
    fn finish(self: &Arc<Self>, id: &JobId, outcome: RunOutcome) {
        let mut state = self.state.lock();
        if state.active.as_ref().is_some_and(|a| &a.id == id) {
            state.active = None;
        }

        if let Some(job) = state.jobs.get_mut(id) {
            let canceled = job.status == JobStatus::Canceled;
            let changes = match outcome {
                _ if canceled => JobUpdate::new(id.clone())
                    .with_progress(None)
                    .with_message("Canceled"),
                RunOutcome::Canceled => JobUpdate::new(id.clone())
                    .with_status(JobStatus::Canceled)
                    .with_progress(None)
                    .with_message("Canceled"),
                RunOutcome::Succeeded => JobUpdate::new(id.clone())
                    .with_status(JobStatus::Done)
                    .with_progress(Some(1.0))
                    .with_message("Done"),
                RunOutcome::Failed { detail } => JobUpdate::new(id.clone())
                    .with_status(JobStatus::Error)
                    .with_progress(None)
                    .with_message("Failed")
                    .with_error_detail(Some(detail)),
            };
            self.mutate(job, changes);
            tracing::info!(job_id = %id, status = %job.status, "Job finished");
        }

        self.dispatch(&mut state);
    }
}
