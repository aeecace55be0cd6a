//! Batchforge - batch ffmpeg conversions with live progress
//!
//! This library crate exposes the host-side pieces of the command-line tool
//! for integration testing.

pub mod batch;
pub mod board;
pub mod config;
