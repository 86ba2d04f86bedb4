use crate::monitor::constants::PROGRESS_TICK_INTERVAL_MS;
use crate::monitor::error::{PingError, Result};
use colored::*;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

/// Progress bar for runs with a fixed probe count, with live latency figures
pub struct ProgressTracker {
    pb: ProgressBar,
    replies: u64,
    lost: u64,
    latency_sum_ms: f64,
}

impl ProgressTracker {
    /// Create a progress tracker for `total` probes across all targets
    pub fn new(total: u64) -> Result<Self> {
        Self::with_bar(ProgressBar::new(total))
    }

    /// Same as [`ProgressTracker::new`] but never draws; for tests
    pub fn hidden(total: u64) -> Result<Self> {
        Self::with_bar(ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden()))
    }

    fn with_bar(pb: ProgressBar) -> Result<Self> {
        pb.set_style(
            ProgressStyle::with_template("{msg}\n{bar:40.cyan/blue} {pos:>5}/{len:5} [{elapsed_precise}]")
                .map_err(|e| PingError::Config(format!("Failed to create progress style: {}", e)))?
                .progress_chars("█░"),
        );
        pb.enable_steady_tick(Duration::from_millis(PROGRESS_TICK_INTERVAL_MS));
        Ok(Self {
            pb,
            replies: 0,
            lost: 0,
            latency_sum_ms: 0.0,
        })
    }

    /// Count one completed probe and refresh the live figures
    pub fn update(&mut self, latency_ms: Option<f64>) {
        self.pb.inc(1);
        match latency_ms {
            Some(ms) => {
                self.replies += 1;
                self.latency_sum_ms += ms;
            }
            None => self.lost += 1,
        }
        self.pb.set_message(self.live_stats(latency_ms));
    }

    fn live_stats(&self, last_ms: Option<f64>) -> String {
        let last = match last_ms {
            Some(ms) if ms < 50.0 => format!("{:.1}ms", ms).green(),
            Some(ms) if ms < 150.0 => format!("{:.1}ms", ms).yellow(),
            Some(ms) => format!("{:.1}ms", ms).red(),
            None => "lost".red(),
        };
        let mean = if self.replies > 0 {
            self.latency_sum_ms / self.replies as f64
        } else {
            0.0
        };
        let done = self.replies + self.lost;
        let loss_pct = if done > 0 {
            self.lost as f64 / done as f64 * 100.0
        } else {
            0.0
        };
        format!("→ {}   Mean: {:.1}ms   Loss: {:.1}%", last, mean, loss_pct)
    }

    /// Print a line above the bar without tearing it
    pub fn println(&self, line: impl AsRef<str>) {
        self.pb.println(line);
    }

    pub fn position(&self) -> u64 {
        self.pb.position()
    }

    /// Finish the progress bar
    pub fn finish(&self) {
        self.pb.finish();
    }
}
