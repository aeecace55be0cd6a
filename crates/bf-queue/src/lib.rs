//! bf-queue: the single-worker conversion queue.
//!
//! [`JobQueue`] owns every job record and the FIFO backlog, and dispatches
//! one job at a time to a [`JobRunner`], which supervises a single ffmpeg
//! process from launch to exit. Observers learn about jobs only through
//! [`bf_core::JobUpdate`] notifications.

pub mod queue;
pub mod runner;

pub use queue::JobQueue;
pub use runner::{JobRunner, RunOutcome, RunnerEvent};
