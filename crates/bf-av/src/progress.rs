//! Parser for ffmpeg's `-progress` key/value stream.
//!
//! ffmpeg writes blocks of `key=value` lines, each block ending with
//! `progress=continue` (or `progress=end` for the last one). Only the
//! elapsed output time and the end marker matter for completion.

/// Converts progress lines into monotonically increasing completion
/// fractions.
#[derive(Debug, Clone)]
pub struct ProgressParser {
    duration_ms: Option<u64>,
    last: Option<f64>,
}

impl ProgressParser {
    /// Create a parser for a source of the given duration.
    ///
    /// Without a (non-zero) duration, elapsed-time lines are ignored and only
    /// the end marker produces a value.
    pub fn new(duration_ms: Option<u64>) -> Self {
        Self {
            duration_ms: duration_ms.filter(|&d| d > 0),
            last: None,
        }
    }

    /// Parse one line. Returns the new fraction if it advanced.
    pub fn parse_line(&mut self, line: &str) -> Option<f64> {
        let (key, value) = line.trim().split_once('=')?;
        let fraction = match key.trim() {
            // Despite its name, out_time_ms carries microseconds.
            "out_time_ms" | "out_time_us" => {
                let duration_ms = self.duration_ms?;
                let elapsed_us: i64 = value.trim().parse().ok()?;
                (elapsed_us.max(0) as f64 / (duration_ms as f64 * 1000.0)).min(1.0)
            }
            "progress" if value.trim() == "end" => 1.0,
            _ => return None,
        };

        match self.last {
            Some(last) if fraction <= last => None,
            _ => {
                self.last = Some(fraction);
                Some(fraction)
            }
        }
    }
}
