//! Application configuration types.
//!
//! The top-level [`Config`] is deserialized by the host (TOML in the
//! `batchforge` binary). Every section defaults sensibly so an empty file is
//! valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub queue: QueueConfig,
}

impl Config {
    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (key, path) in [
            ("tools.ffmpeg_path", &self.tools.ffmpeg_path),
            ("tools.ffprobe_path", &self.tools.ffprobe_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "{key} '{}' does not exist; falling back to PATH",
                        p.display()
                    ));
                }
            }
        }

        if self.queue.event_capacity == 0 {
            warnings.push("queue.event_capacity is 0; using 1".into());
        }

        if self.queue.probe_timeout_secs == 0 {
            warnings.push("queue.probe_timeout_secs is 0; every probe will time out".into());
        }

        if self.queue.cancel_kill_after_secs == Some(0) {
            warnings.push(
                "queue.cancel_kill_after_secs is 0; canceled jobs are killed immediately".into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Explicit paths to external tools. Unset paths are looked up on `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Job queue behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Buffer size of the update broadcast channel.
    pub event_capacity: usize,
    /// Upper bound on a single duration probe.
    pub probe_timeout_secs: u64,
    /// Force-kill a canceled process that is still alive this long after the
    /// terminate request. Unset means never escalate.
    pub cancel_kill_after_secs: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            probe_timeout_secs: 30,
            cancel_kill_after_secs: None,
        }
    }
}

impl QueueConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn cancel_kill_after(&self) -> Option<Duration> {
        self.cancel_kill_after_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.queue.event_capacity, 1024);
        assert_eq!(cfg.queue.probe_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.queue.cancel_kill_after(), None);
        assert!(cfg.tools.ffmpeg_path.is_none());
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn empty_document_is_valid() {
        let cfg: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn partial_queue_section_keeps_other_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{"queue":{"cancel_kill_after_secs":5}}"#).unwrap();
        assert_eq!(cfg.queue.cancel_kill_after(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.queue.event_capacity, 1024);
    }

    #[test]
    fn validate_flags_missing_override_and_zero_values() {
        let mut cfg = Config::default();
        cfg.tools.ffmpeg_path = Some(PathBuf::from("/nonexistent/ffmpeg_xyz"));
        cfg.queue.event_capacity = 0;
        cfg.queue.cancel_kill_after_secs = Some(0);

        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("tools.ffmpeg_path"));
    }
}
