//! Progress bars for transfer operations
//!
//! Implements the engine's progress traits on top of indicatif. In quiet,
//! JSON or no-progress mode every tracker is a no-op.

use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use r2up_core::{NoProgress, ProgressReporter, ProgressTracker, ProgressUnit};

use super::OutputConfig;

const BYTES_TEMPLATE: &str =
    "{spinner:.green} {msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})";
const FILES_TEMPLATE: &str = "{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} files";

/// Reporter that draws one bar per tracked operation
#[derive(Debug, Clone)]
pub struct TransferProgress {
    config: OutputConfig,
}

impl TransferProgress {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Check if bars will be drawn
    pub fn is_visible(&self) -> bool {
        self.config.progress_enabled()
    }
}

fn style(unit: ProgressUnit) -> ProgressStyle {
    let template = match unit {
        ProgressUnit::Bytes => BYTES_TEMPLATE,
        ProgressUnit::Files => FILES_TEMPLATE,
    };
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

impl ProgressReporter for TransferProgress {
    fn start(&self, label: &str, total: u64, unit: ProgressUnit) -> Arc<dyn ProgressTracker> {
        if !self.is_visible() {
            return Arc::new(NoProgress);
        }
        let bar = ProgressBar::new(total);
        bar.set_style(style(unit));
        bar.set_message(label.to_string());
        Arc::new(BarTracker(bar))
    }
}

/// Tracker backed by a single indicatif bar
struct BarTracker(ProgressBar);

impl ProgressTracker for BarTracker {
    fn advance(&self, delta: u64) {
        self.0.inc(delta);
    }

    fn finish(&self) {
        self.0.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_hidden_in_quiet_json_and_no_progress_modes() {
        for config in [
            OutputConfig {
                quiet: true,
                ..Default::default()
            },
            OutputConfig {
                json: true,
                ..Default::default()
            },
            OutputConfig {
                no_progress: true,
                ..Default::default()
            },
        ] {
            assert!(!TransferProgress::new(config).is_visible());
        }
    }

    #[test]
    fn test_progress_visible_by_default() {
        let progress = TransferProgress::new(OutputConfig::default());
        assert!(progress.is_visible());

        let tracker = progress.start("upload", 10, ProgressUnit::Bytes);
        tracker.advance(4);
        tracker.advance(6);
        tracker.finish();
    }

    #[test]
    fn test_templates_compile() {
        assert!(ProgressStyle::default_bar().template(BYTES_TEMPLATE).is_ok());
        assert!(ProgressStyle::default_bar().template(FILES_TEMPLATE).is_ok());
    }
}
