//! Incremental line splitting for streamed process output.

/// Longest line held back before it is emitted unterminated.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Turns arbitrary byte chunks into complete lines.
///
/// A line ends at `\n`, `\r` or `\r\n`, so ffmpeg's carriage-return status
/// updates come out one per line. Bytes after the last terminator are held
/// until a later chunk completes them, so a line (or a multi-byte character)
/// split across reads comes out whole. A line longer than [`MAX_LINE_BYTES`]
/// is cut there.
#[derive(Debug, Default)]
pub struct LineSplitter {
    pending: Vec<u8>,
    /// The previous chunk ended on `\r`; a leading `\n` belongs to it.
    after_cr: bool,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every line it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(&first) = rest.first() {
            if std::mem::take(&mut self.after_cr) && first == b'\n' {
                rest = &rest[1..];
                continue;
            }
            match rest.iter().position(|&b| b == b'\n' || b == b'\r') {
                Some(pos) => {
                    self.pending.extend_from_slice(&rest[..pos]);
                    lines.push(self.take_line());
                    self.after_cr = rest[pos] == b'\r';
                    rest = &rest[pos + 1..];
                }
                None => {
                    self.pending.extend_from_slice(rest);
                    rest = &[];
                }
            }
            if self.pending.len() >= MAX_LINE_BYTES {
                lines.push(self.take_line());
            }
        }

        lines
    }

    /// Flush the unterminated tail once the stream has closed.
    pub fn finish(&mut self) -> Option<String> {
        self.after_cr = false;
        if self.pending.is_empty() {
            return None;
        }
        Some(self.take_line())
    }

    fn take_line(&mut self) -> String {
        let bytes = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_lines_in_one_chunk() {
        let mut s = LineSplitter::new();
        let lines = s.push(b"frame=1\nfps=24.0\nprogress=continue\n");
        assert_eq!(lines, vec!["frame=1", "fps=24.0", "progress=continue"]);
        assert_eq!(s.finish(), None);
    }

    #[test]
    fn line_split_across_chunks() {
        let mut s = LineSplitter::new();
        assert!(s.push(b"out_time_ms=50").is_empty());
        assert_eq!(s.pending, b"out_time_ms=50");
        let lines = s.push(b"00000\nprogress=con");
        assert_eq!(lines, vec!["out_time_ms=5000000"]);
        let lines = s.push(b"tinue\n");
        assert_eq!(lines, vec!["progress=continue"]);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let text = "Stream #0:0 (für)\n".as_bytes();
        let split = text.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut s = LineSplitter::new();
        assert!(s.push(&text[..split]).is_empty());
        assert_eq!(s.push(&text[split..]), vec!["Stream #0:0 (für)"]);
    }

    #[test]
    fn crlf_and_empty_lines() {
        let mut s = LineSplitter::new();
        let lines = s.push(b"a\r\n\r\nb\n");
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[test]
    fn finish_flushes_unterminated_tail() {
        let mut s = LineSplitter::new();
        assert_eq!(s.push(b"progress=end\nlast words"), vec!["progress=end"]);
        assert_eq!(s.finish().as_deref(), Some("last words"));
        assert_eq!(s.finish(), None);
    }

    #[test]
    fn carriage_returns_end_lines() {
        let mut s = LineSplitter::new();
        let lines = s.push(b"frame=  10 fps=0.0\rframe=  20 fps=19\rframe=  3");
        assert_eq!(lines, vec!["frame=  10 fps=0.0", "frame=  20 fps=19"]);
        assert_eq!(s.finish().as_deref(), Some("frame=  3"));
    }

    #[test]
    fn crlf_split_across_chunks_is_one_break() {
        let mut s = LineSplitter::new();
        assert_eq!(s.push(b"Input #0\r"), vec!["Input #0"]);
        assert_eq!(s.push(b"\nStream #0:0\n"), vec!["Stream #0:0"]);
        assert!(s.pending.is_empty());
    }

    #[test]
    fn unterminated_stream_stays_bounded() {
        let mut s = LineSplitter::new();
        let chunk = vec![b'x'; 8 * 1024];
        let mut lines = Vec::new();
        for _ in 0..20 {
            lines.extend(s.push(&chunk));
            assert!(s.pending.len() < MAX_LINE_BYTES);
        }
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.len() == MAX_LINE_BYTES));
        assert_eq!(s.finish().map(|l| l.len()), Some(20 * 8 * 1024 - 2 * MAX_LINE_BYTES));
    }
}
