//! Progress updates emitted by [`CodebaseIndexer::refresh`](super::CodebaseIndexer::refresh)

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingStatus {
    Disabled,
    Loading,
    Indexing,
    Done,
    Failed,
    Paused,
    Cancelled,
}

impl IndexingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Loading => "loading",
            Self::Indexing => "indexing",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Paused => "paused",
            Self::Cancelled => "cancelled",
        }
    }

    /// No further updates follow one with this status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Disabled | Self::Done | Self::Failed | Self::Cancelled
        )
    }
}

impl fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexingProgressUpdate {
    /// Overall progress of the refresh, in [0, 1]
    pub progress: f64,
    pub desc: String,
    pub status: IndexingStatus,
}

impl IndexingProgressUpdate {
    pub fn new(progress: f64, desc: impl Into<String>, status: IndexingStatus) -> Self {
        Self {
            progress: progress.clamp(0.0, 1.0),
            desc: desc.into(),
            status,
        }
    }

    pub fn disabled(desc: impl Into<String>) -> Self {
        Self::new(0.0, desc, IndexingStatus::Disabled)
    }

    pub fn failed(desc: impl Into<String>) -> Self {
        Self::new(0.0, desc, IndexingStatus::Failed)
    }

    pub fn cancelled() -> Self {
        Self::new(1.0, "Indexing cancelled", IndexingStatus::Cancelled)
    }

    pub fn done() -> Self {
        Self::new(1.0, "Indexing Complete", IndexingStatus::Done)
    }

    /// Reported by a consumer when it pauses a refresh at `progress`
    pub fn paused(progress: f64) -> Self {
        Self::new(progress, "Indexing paused", IndexingStatus::Paused)
    }

    pub fn resumed(progress: f64) -> Self {
        Self::new(progress, "Indexing resumed", IndexingStatus::Indexing)
    }
}

/// Keeps the progress of one refresh within [0, 1] and non-decreasing
#[derive(Debug, Default)]
pub(crate) struct ProgressTracker {
    high_water: f64,
}

impl ProgressTracker {
    pub(crate) fn update(
        &mut self,
        progress: f64,
        desc: impl Into<String>,
        status: IndexingStatus,
    ) -> IndexingProgressUpdate {
        let progress = if progress.is_nan() {
            self.high_water
        } else {
            progress.clamp(0.0, 1.0).max(self.high_water)
        };
        self.high_water = progress;
        IndexingProgressUpdate::new(progress, desc, status)
    }
}

/// Map an artifact's local progress into the progress of the whole refresh
pub(crate) fn overall_progress(
    completed_dirs: usize,
    total_dirs: usize,
    completed_artifacts: usize,
    total_artifacts: usize,
    local: f64,
) -> f64 {
    if total_dirs == 0 || total_artifacts == 0 {
        return 0.0;
    }
    let within_dir = (completed_artifacts as f64 + local) / total_artifacts as f64;
    (completed_dirs as f64 + within_dir) / total_dirs as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_progress_scaling() {
        assert_eq!(overall_progress(0, 2, 0, 4, 0.0), 0.0);
        assert_eq!(overall_progress(0, 2, 2, 4, 0.0), 0.25);
        assert_eq!(overall_progress(1, 2, 3, 4, 1.0), 1.0);
        assert_eq!(overall_progress(1, 2, 0, 4, 0.5), 0.5625);
    }

    #[test]
    fn test_tracker_never_decreases() {
        let mut tracker = ProgressTracker::default();
        assert_eq!(tracker.update(0.4, "a", IndexingStatus::Indexing).progress, 0.4);
        assert_eq!(tracker.update(0.2, "b", IndexingStatus::Indexing).progress, 0.4);
        assert_eq!(tracker.update(1.7, "c", IndexingStatus::Indexing).progress, 1.0);
        assert_eq!(tracker.update(f64::NAN, "d", IndexingStatus::Indexing).progress, 1.0);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let update = IndexingProgressUpdate::cancelled();
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"], "cancelled");
        assert_eq!(json["progress"], 1.0);
        assert!(update.status.is_terminal());
        assert!(!IndexingStatus::Paused.is_terminal());
    }

    #[test]
    fn test_pause_updates_keep_progress() {
        let paused = IndexingProgressUpdate::paused(0.42);
        assert_eq!(paused.status, IndexingStatus::Paused);
        assert_eq!(paused.progress, 0.42);
        assert_eq!(serde_json::to_value(&paused).unwrap()["status"], "paused");

        let resumed = IndexingProgressUpdate::resumed(0.42);
        assert_eq!(resumed.status, IndexingStatus::Indexing);
        assert_eq!(resumed.desc, "Indexing resumed");
    }
}
