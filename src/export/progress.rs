//! Progress reporting for export operations
//!
//! Shows a spinner with the number of exported documents and the current
//! throughput. The total is unknown up front because the index is paginated.

use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Progress tracker for export operations
pub struct ProgressTracker {
    /// Start time of the operation
    start_time: Instant,
    /// Spinner (optional, disabled for library use)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `enable_bar` - Whether to display a spinner on stderr
    pub fn new(enable_bar: bool) -> Self {
        let bar = enable_bar.then(|| {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.green} {pos} documents {msg}")
            {
                bar.set_style(style);
            }
            bar
        });

        Self {
            start_time: Instant::now(),
            bar,
        }
    }

    /// Tracker that reports nothing
    pub fn hidden() -> Self {
        Self::new(false)
    }

    /// Update with the total number of documents exported so far
    pub fn update(&self, exported: u64, pages: u64) {
        if let Some(ref bar) = self.bar {
            bar.set_position(exported);

            let elapsed = self.start_time.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                let speed = exported as f64 / elapsed;
                bar.set_message(format!("({speed:.0} docs/sec, {pages} index pages)"));
            }
        }
    }

    /// Finish and clear the spinner
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_tracker_updates() {
        let tracker = ProgressTracker::hidden();
        tracker.update(500, 2);
        tracker.finish();
    }

    #[test]
    fn test_enabled_tracker_updates() {
        let tracker = ProgressTracker::new(true);
        tracker.update(10, 1);
        tracker.finish();
    }
}
