//! Rolling tail of ffmpeg's diagnostic (stderr) output.

use std::collections::VecDeque;

/// Lines kept per invocation.
pub const DIAGNOSTIC_CAPACITY: usize = 8;

/// Lines quoted in a failure message.
const FAILURE_EXCERPT_LINES: usize = 3;

/// Separator between excerpt lines in a failure message.
pub const EXCERPT_SEPARATOR: &str = " | ";

/// Bounded buffer of the most recent non-empty diagnostic lines.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    lines: VecDeque<String>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self {
            lines: VecDeque::with_capacity(DIAGNOSTIC_CAPACITY),
        }
    }

    /// Record a line. Whitespace is trimmed and blank lines are dropped; the
    /// oldest line is evicted once the buffer is full.
    pub fn push(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if self.lines.len() == DIAGNOSTIC_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    /// The last `n` lines, oldest first.
    pub fn tail(&self, n: usize) -> Vec<&str> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Condensed failure text for a process that exited unsuccessfully.
    ///
    /// `code` is `None` when the process was ended by a signal.
    pub fn failure_detail(&self, tool: &str, code: Option<i32>) -> String {
        let code = code.map_or_else(|| "unknown".to_string(), |c| c.to_string());
        let mut detail = format!("{tool} exited with code {code}");
        let excerpt = self.tail(FAILURE_EXCERPT_LINES);
        if !excerpt.is_empty() {
            detail.push_str(": ");
            detail.push_str(&excerpt.join(EXCERPT_SEPARATOR));
        }
        detail
    }
}
