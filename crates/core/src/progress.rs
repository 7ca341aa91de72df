//! Progress reporting side channel
//!
//! Uploads report progress through these traits and never look at the
//! outcome, so a reporter cannot fail or slow down a transfer beyond the cost
//! of the call itself. [`NoProgress`] is used for non-interactive runs.

use std::sync::Arc;

/// Files larger than this show byte-level progress for single-shot uploads
pub const PROGRESS_THRESHOLD: u64 = 1024 * 1024;

/// Creates a tracker per operation
pub trait ProgressReporter: Send + Sync {
    /// Start tracking an operation of `total` units (bytes or files)
    fn start(&self, label: &str, total: u64, unit: ProgressUnit) -> Arc<dyn ProgressTracker>;
}

/// What a tracker counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressUnit {
    Bytes,
    Files,
}

/// Receives increments for one operation
pub trait ProgressTracker: Send + Sync {
    /// Add `delta` units to the completed count
    fn advance(&self, delta: u64);

    /// Operation finished, successfully or not
    fn finish(&self) {}
}

/// Reporter that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn start(&self, _label: &str, _total: u64, _unit: ProgressUnit) -> Arc<dyn ProgressTracker> {
        Arc::new(NoProgress)
    }
}

impl ProgressTracker for NoProgress {
    fn advance(&self, _delta: u64) {}
}

/// Tracker handle for callers that may or may not want progress
pub(crate) fn tracker_for(
    reporter: &dyn ProgressReporter,
    enabled: bool,
    label: &str,
    total: u64,
    unit: ProgressUnit,
) -> Arc<dyn ProgressTracker> {
    if enabled {
        reporter.start(label, total, unit)
    } else {
        Arc::new(NoProgress)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingReporter;
    use super::*;

    #[test]
    fn test_disabled_tracker_never_reaches_reporter() {
        let reporter = RecordingReporter::default();
        let tracker = tracker_for(&reporter, false, "upload", 10, ProgressUnit::Bytes);
        tracker.advance(5);
        assert!(reporter.started.lock().unwrap().is_empty());
        assert!(reporter.positions().is_empty());
    }

    #[test]
    fn test_enabled_tracker_accumulates() {
        let reporter = RecordingReporter::default();
        let tracker = tracker_for(&reporter, true, "upload", 10, ProgressUnit::Bytes);
        tracker.advance(4);
        tracker.advance(6);
        tracker.finish();
        assert_eq!(reporter.positions(), vec![4, 10]);
        assert!(*reporter.tracker.finished.lock().unwrap());
    }
}
