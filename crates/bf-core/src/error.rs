//! Unified error type for batchforge.
//!
//! Job failures are never surfaced through [`Error`]; they become job state.
//! This type covers the surrounding plumbing: tool resolution, bounded tool
//! runs, I/O and configuration.

/// Unified error type covering the non-job failure modes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool could not be located.
    #[error("{tool} is not available: {remediation}")]
    ToolUnavailable {
        /// Name of the missing tool.
        tool: String,
        /// What the user can do about it.
        remediation: String,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Configuration or batch data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::ToolUnavailable`].
    pub fn tool_unavailable(tool: impl Into<String>, remediation: impl Into<String>) -> Self {
        Error::ToolUnavailable {
            tool: tool.into(),
            remediation: remediation.into(),
        }
    }

    /// Whether this error means a tool is missing rather than misbehaving.
    pub fn is_tool_unavailable(&self) -> bool {
        matches!(self, Error::ToolUnavailable { .. })
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_unavailable_display() {
        let err = Error::tool_unavailable("ffmpeg", "install ffmpeg or set tools.ffmpeg_path");
        assert_eq!(
            err.to_string(),
            "ffmpeg is not available: install ffmpeg or set tools.ffmpeg_path"
        );
        assert!(err.is_tool_unavailable());
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffprobe", "timed out after 30s");
        assert_eq!(err.to_string(), "Tool error [ffprobe]: timed out after 30s");
        assert!(!err.is_tool_unavailable());
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn validation_display() {
        let err = Error::Validation("job id is empty".into());
        assert_eq!(err.to_string(), "Validation error: job id is empty");
    }
}
