//! bf-core: shared job types, errors, configuration, and the update bus.
//!
//! This crate is the foundational dependency for the other bf-* crates. It
//! owns the job data model and the [`JobUpdate`] change notifications that
//! are the only way observers learn about job progress.

pub mod config;
pub mod error;
pub mod events;
pub mod job;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use events::{JobUpdate, UpdateBus};
pub use job::{Job, JobId, JobRequest, JobStatus};
