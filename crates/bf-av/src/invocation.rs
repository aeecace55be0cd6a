//! ffmpeg argument construction.
//!
//! The full argument vector is what gets executed. The summary is what the
//! user is shown: the same command without the progress plumbing flags.

use std::path::{Path, PathBuf};

/// Flags that route machine-readable progress to stdout and silence the
/// periodic human-readable statistics line.
const PROGRESS_FLAGS: &[&str] = &["-progress", "pipe:1", "-nostats"];

/// One ffmpeg conversion, ready to be launched.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInvocation {
    program: PathBuf,
    overwrite: bool,
    source: PathBuf,
    passthrough: Vec<String>,
    output: PathBuf,
}

impl FfmpegInvocation {
    pub fn new(
        program: impl Into<PathBuf>,
        source: impl Into<PathBuf>,
        passthrough: Vec<String>,
        output: impl Into<PathBuf>,
        overwrite: bool,
    ) -> Self {
        Self {
            program: program.into(),
            overwrite,
            source: source.into(),
            passthrough,
            output: output.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Name of the executable, for messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Arguments in execution order: overwrite policy, input, pass-through
    /// arguments, progress flags, output.
    pub fn args(&self) -> Vec<String> {
        let mut args = self.logical_args_head();
        args.extend(PROGRESS_FLAGS.iter().map(|f| f.to_string()));
        args.push(self.output.to_string_lossy().into_owned());
        args
    }

    /// Displayable command line, omitting the progress flags.
    pub fn summary(&self) -> String {
        let mut parts = vec![quote_arg(&self.program.to_string_lossy())];
        parts.extend(self.logical_args_head().iter().map(|a| quote_arg(a)));
        parts.push(quote_arg(&self.output.to_string_lossy()));
        parts.join(" ")
    }

    fn logical_args_head(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(self.passthrough.len() + 3);
        args.push(if self.overwrite { "-y" } else { "-n" }.to_string());
        args.push("-i".to_string());
        args.push(self.source.to_string_lossy().into_owned());
        args.extend(self.passthrough.iter().cloned());
        args
    }
}

/// Quote an argument for display if it contains whitespace or is empty.
///
/// Embedded double quotes and backslashes are escaped inside the quotes.
pub fn quote_arg(arg: &str) -> String {
    if !arg.is_empty() && !arg.chars().any(char::is_whitespace) {
        return arg.to_string();
    }
    let escaped = arg.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}
