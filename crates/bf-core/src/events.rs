//! Job change notifications.
//!
//! Every externally visible mutation of a job produces a [`JobUpdate`]
//! carrying only the fields that changed. [`UpdateBus`] wraps a
//! `tokio::sync::broadcast` channel with a bounded ring buffer of recent
//! updates so that late observers can catch up.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::sync::broadcast;

use crate::job::{JobId, JobStatus};

/// Maximum number of updates retained in the ring buffer.
const MAX_RECENT_UPDATES: usize = 100;

// ---------------------------------------------------------------------------
// JobUpdate
// ---------------------------------------------------------------------------

/// Partial update for one job.
///
/// A field that is `None` did not change and must not overwrite what an
/// observer already knows. Fields that can be cleared use a nested `Option`:
/// `Some(None)` means "now absent".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdate {
    pub id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub progress: Option<Option<f64>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub resolved_output_path: Option<Option<PathBuf>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub error_detail: Option<Option<String>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub invocation_summary: Option<Option<String>>,
}

impl JobUpdate {
    /// An update for `id` with no fields set.
    pub fn new(id: impl Into<JobId>) -> Self {
        Self {
            id: id.into(),
            status: None,
            progress: None,
            resolved_output_path: None,
            message: None,
            error_detail: None,
            invocation_summary: None,
        }
    }

    /// Whether the update carries no changed fields.
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.progress.is_none()
            && self.resolved_output_path.is_none()
            && self.message.is_none()
            && self.error_detail.is_none()
            && self.invocation_summary.is_none()
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_progress(mut self, progress: Option<f64>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_resolved_output_path(mut self, path: PathBuf) -> Self {
        self.resolved_output_path = Some(Some(path));
        self
    }

    pub fn with_error_detail(mut self, detail: Option<String>) -> Self {
        self.error_detail = Some(detail);
        self
    }

    pub fn with_invocation_summary(mut self, summary: impl Into<String>) -> Self {
        self.invocation_summary = Some(Some(summary.into()));
        self
    }
}

/// Serde helpers distinguishing a missing field from an explicit `null`.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

// ---------------------------------------------------------------------------
// UpdateBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent updates.
pub struct UpdateBus {
    tx: broadcast::Sender<JobUpdate>,
    recent: RwLock<VecDeque<JobUpdate>>,
}

impl UpdateBus {
    /// Create a new update bus.
    ///
    /// `capacity` controls the broadcast channel buffer size (not the ring
    /// buffer, which is always [`MAX_RECENT_UPDATES`]).
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_UPDATES)),
        }
    }

    /// Subscribe to updates published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobUpdate> {
        self.tx.subscribe()
    }

    /// Publish an update to all current subscribers and store it in the
    /// ring buffer.
    pub fn publish(&self, update: JobUpdate) {
        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_UPDATES {
                recent.pop_back();
            }
            recent.push_front(update.clone());
        }

        // No subscribers is fine.
        if self.tx.send(update).is_err() {
            tracing::trace!("No subscribers for job update");
        }
    }

    /// Return the `n` most recent updates (newest first).
    pub fn recent(&self, n: usize) -> Vec<JobUpdate> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
