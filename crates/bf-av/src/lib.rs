//! # bf-av
//!
//! External tool plumbing for the batchforge job queue.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find ffmpeg and ffprobe, with a
//!   remediation message when one is missing.
//! - **Bounded runs** ([`ToolCommand`]) -- capture-everything execution with a
//!   timeout, used for probing.
//! - **Duration probing** ([`ProbeClient`]) -- best-effort source duration.
//! - **Stream parsing** ([`LineSplitter`], [`ProgressParser`],
//!   [`DiagnosticLog`]) -- incremental handling of ffmpeg's progress and
//!   diagnostic output.
//! - **Output naming** ([`PathAllocator`]) -- collision-free destinations.
//! - **Invocation building** ([`FfmpegInvocation`]) -- the argument vector and
//!   its displayable summary.

pub mod command;
pub mod diagnostics;
pub mod invocation;
pub mod lines;
pub mod paths;
pub mod probe;
pub mod progress;
pub mod tools;

// ---- Re-exports for convenience ----

pub use command::{ToolCommand, ToolOutput};
pub use diagnostics::DiagnosticLog;
pub use invocation::FfmpegInvocation;
pub use lines::LineSplitter;
pub use paths::PathAllocator;
pub use probe::ProbeClient;
pub use progress::ProgressParser;
pub use tools::{ToolInfo, ToolPaths, ToolRegistry};
