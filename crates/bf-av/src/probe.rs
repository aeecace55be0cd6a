//! Best-effort source duration lookup via ffprobe.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::ToolCommand;

/// Asks ffprobe for a source's container duration.
#[derive(Debug, Clone)]
pub struct ProbeClient {
    ffprobe_path: PathBuf,
    timeout: Duration,
}

impl ProbeClient {
    /// Create a client using the given ffprobe path and per-probe timeout.
    pub fn new(ffprobe_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffprobe_path,
            timeout,
        }
    }

    /// Container duration of `source` in whole milliseconds (rounded).
    ///
    /// Returns `None` when ffprobe cannot be launched, exits non-zero, times
    /// out, or prints something that is not a duration. Never an error: a
    /// missing duration only makes progress indeterminate.
    pub async fn duration_ms(&self, source: &Path) -> Option<u64> {
        let cmd = ToolCommand::new(&self.ffprobe_path)
            .timeout(self.timeout)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(source.to_string_lossy());

        match cmd.execute().await {
            Ok(output) => {
                let parsed = parse_duration_ms(&output.stdout);
                if parsed.is_none() {
                    tracing::debug!(
                        source = %source.display(),
                        output = output.stdout.trim(),
                        "Unparsable duration from ffprobe"
                    );
                }
                parsed
            }
            Err(e) => {
                tracing::debug!(source = %source.display(), error = %e, "Duration probe failed");
                None
            }
        }
    }
}

/// Parse ffprobe's bare `format=duration` output (seconds) into milliseconds.
fn parse_duration_ms(stdout: &str) -> Option<u64> {
    let secs: f64 = stdout.lines().next()?.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some((secs * 1000.0).round() as u64)
}
