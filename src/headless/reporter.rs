use crate::monitor::error::Result;
use crate::monitor::model::Target;
use crate::monitor::session::TargetMonitor;
use crate::monitor::statistics::{Quality, Statistics};
use crate::monitor::store::Snapshot;
use crate::probe::ProbeMethod;
use colored::*;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reporter for printing end-of-run summaries
pub struct Reporter;

// Constants for histogram visualization
const HISTOGRAM_BAR_WIDTH: usize = 30;

// Percentage thresholds for color coding
const HIGH_PERCENTAGE_THRESHOLD: f64 = 50.0;
const MEDIUM_PERCENTAGE_THRESHOLD: f64 = 10.0;

// Percentage thresholds for formatting precision
const LOW_PERCENTAGE_THRESHOLD: f64 = 0.1;
const MEDIUM_PRECISION_THRESHOLD: f64 = 1.0;

// Width for histogram labels (must be consistent for alignment)
const LABEL_WIDTH: usize = 12;

const BUCKET_COUNT: usize = 8;

/// Latency buckets in milliseconds: `[min, max)` and label
const BUCKETS: [(f64, f64, &str); BUCKET_COUNT] = [
    (0.0, 10.0, "0-10 ms"),
    (10.0, 30.0, "10-30 ms"),
    (30.0, 50.0, "30-50 ms"),
    (50.0, 100.0, "50-100 ms"),
    (100.0, 200.0, "100-200 ms"),
    (200.0, 500.0, "200-500 ms"),
    (500.0, 1000.0, "500ms-1s"),
    (1000.0, f64::INFINITY, ">1 s"),
];

impl Reporter {
    /// Renders a histogram bar scaled against the largest bucket.
    ///
    /// The fullest bucket spans the whole width and the others are drawn in
    /// proportion to it with full blocks (█). A bucket whose bar rounds down to
    /// zero width still gets one partial block (▊▌▎▏) picked from the
    /// fractional width, so small but non-empty buckets stay visible.
    ///
    /// # Arguments
    ///
    /// * `percentage` - Share of replies in this bucket
    /// * `max_percentage` - Share of the fullest bucket, used for scaling
    /// * `bar_width` - Width of a full bar in characters
    ///
    /// # Returns
    ///
    /// The bar characters, or an empty string for an empty bucket
    fn render_bar_from_percentage(
        percentage: f64,
        max_percentage: f64,
        bar_width: usize,
    ) -> String {
        if percentage <= 0.0 {
            return String::new();
        }

        let bar_length_fractional = if max_percentage > 0.0 {
            (percentage / max_percentage) * bar_width as f64
        } else {
            0.0
        };
        let bar_length = bar_length_fractional as usize;

        if bar_length >= bar_width {
            "█".repeat(bar_width)
        } else if bar_length >= 1 {
            "█".repeat(bar_length)
        } else {
            match bar_length_fractional.fract() {
                f if f >= 0.75 => "▊".to_string(),
                f if f >= 0.5 => "▌".to_string(),
                f if f >= 0.25 => "▎".to_string(),
                _ => "▏".to_string(),
            }
        }
    }

    /// Formats a percentage with precision that grows as the value shrinks.
    ///
    /// - < 0.1%: 3 decimal places (e.g. "0.050%")
    /// - < 1.0%: 2 decimal places (e.g. " 0.50%")
    /// - otherwise 1 decimal place (e.g. " 42.0%")
    ///
    /// # Arguments
    ///
    /// * `percentage` - The value to format, in 0.0..=100.0
    ///
    /// # Returns
    ///
    /// The value padded to 5 characters, followed by `%`
    fn format_percentage(percentage: f64) -> String {
        if percentage < LOW_PERCENTAGE_THRESHOLD {
            format!("{:5.3}%", percentage)
        } else if percentage < MEDIUM_PRECISION_THRESHOLD {
            format!("{:5.2}%", percentage)
        } else {
            format!("{:5.1}%", percentage)
        }
    }

    /// Colours a bucket label by the share of replies it holds.
    ///
    /// The label is padded before colouring so that the escape codes do not
    /// count towards the width and the bars stay aligned.
    ///
    /// # Arguments
    ///
    /// * `label` - Bucket label such as "10-30 ms"
    /// * `percentage` - Share of replies in the bucket
    ///
    /// # Returns
    ///
    /// The right-aligned label, green above 50%, cyan above 10%, plain otherwise
    fn colorize_label(label: &str, percentage: f64) -> String {
        let padded_label = format!("{:>width$}", label, width = LABEL_WIDTH);
        if percentage > HIGH_PERCENTAGE_THRESHOLD {
            padded_label.green().to_string()
        } else if percentage > MEDIUM_PERCENTAGE_THRESHOLD {
            padded_label.cyan().to_string()
        } else {
            padded_label.to_string()
        }
    }

    /// Resolver time for hostnames; IP literals have none.
    fn dns_line(target: &Target) -> Option<String> {
        target
            .dns_time
            .map(|dns| format!("DNS:      {:.1} ms lookup", dns.as_secs_f64() * 1000.0))
    }

    fn colorize_quality(quality: Quality) -> ColoredString {
        let text = quality.to_string();
        match quality {
            Quality::Excellent | Quality::Good => text.green().bold(),
            Quality::Fair | Quality::Poor => text.yellow().bold(),
            Quality::Offline => text.red().bold(),
            Quality::Unknown => text.dimmed(),
        }
    }

    /// Print the summary for one target
    pub fn print_results(
        &self,
        monitor: &TargetMonitor,
        snapshot: &Snapshot,
        method: ProbeMethod,
        elapsed: Duration,
    ) -> Result<()> {
        let stats = snapshot.stats()?;
        debug!(
            host = %monitor.target.label,
            recorded = snapshot.recorded(),
            lost = snapshot.lost(),
            "Printing results"
        );

        println!("\n{}", "┌─────────────────────────────┐".cyan());
        println!("{}", "│  RustyPing Results          │".cyan());
        println!("{}", "└─────────────────────────────┘".cyan());
        println!();
        println!("Target:   {} via {}", monitor.target.label.bold(), method);
        if let Some(line) = Self::dns_line(&monitor.target) {
            println!("{}", line);
        }

        let sent = snapshot.recorded();
        let lost = snapshot.lost();
        let loss_pct = if sent > 0 {
            lost as f64 / sent as f64 * 100.0
        } else {
            0.0
        };
        println!("Probes:   {} sent, {} lost ({:.1}%)", sent, lost, loss_pct);
        println!("Duration: {:.1}s", elapsed.as_secs_f64());
        if monitor.skipped_ticks() > 0 {
            println!(
                "          └─ {} tick(s) skipped while a probe was still in flight",
                monitor.skipped_ticks()
            );
        }
        if monitor.is_unreachable() {
            println!("          └─ {}", "target was unreachable at the end of the run".red());
        }
        println!();

        if stats.count() == 0 {
            warn!(host = %monitor.target.label, "No replies recorded");
            println!("{}", "No replies recorded.".red());
            return Ok(());
        }

        self.print_statistics(&stats, sent - lost);
        self.print_bucket_distribution(snapshot)?;
        println!();

        println!("Quality:  {}", Self::colorize_quality(stats.quality()));
        info!(
            host = %monitor.target.label,
            mean_latency_ms = stats.mean_ms(),
            loss_pct,
            quality = %stats.quality(),
            "Results reported"
        );
        Ok(())
    }

    fn print_statistics(&self, stats: &Statistics, replies: u64) {
        let window_note = if stats.total() as u64 != replies + stats.lost() as u64 {
            format!(" over the last {} samples", stats.total())
        } else {
            String::new()
        };
        println!("Latency Statistics (round-trip time{}):", window_note);
        println!("  Min:       {:>8.2} ms", stats.min().as_secs_f64() * 1000.0);
        println!("  Mean:      {:>8.2} ms", stats.mean_ms());
        println!("  Max:       {:>8.2} ms", stats.max().as_secs_f64() * 1000.0);
        println!("  P50:       {:>8.2} ms", stats.percentile_ms(0.5));
        println!("  P95:       {:>8.2} ms", stats.percentile_ms(0.95));
        println!("  P99:       {:>8.2} ms", stats.percentile_ms(0.99));
        println!("  Jitter:    {:>8.2} ms", stats.jitter_ms());
        println!("  Stability: {:>8.1} %", stats.stability());

        if stats.clamped_count() > 0 {
            println!();
            println!(
                "  ⚠ Note: {} measurement(s) exceeded histogram bounds and were clamped",
                stats.clamped_count()
            );
        }
        println!();
    }

    /// Count replies per latency bucket
    fn bucket_counts(latencies_ms: &[f64]) -> [usize; BUCKET_COUNT] {
        let mut counts = [0usize; BUCKET_COUNT];
        for ms in latencies_ms {
            if let Some(i) = BUCKETS.iter().position(|(min, max, _)| ms >= min && ms < max) {
                counts[i] += 1;
            }
        }
        counts
    }

    /// Print bucket distribution of the replies in the window
    pub fn print_bucket_distribution(&self, snapshot: &Snapshot) -> Result<()> {
        let latencies: Vec<f64> = snapshot.latencies_ms().into_iter().flatten().collect();
        if latencies.is_empty() {
            return Ok(());
        }
        println!("Latency Distribution (replies by range):");
        println!();

        let counts = Self::bucket_counts(&latencies);
        let total = latencies.len() as f64;
        let percentages: Vec<f64> = counts.iter().map(|c| *c as f64 / total * 100.0).collect();
        let max_percentage = percentages.iter().fold(0.0f64, |a, &b| a.max(b));

        // only the range between the first and last non-empty bucket
        let first = counts.iter().position(|c| *c > 0).unwrap_or(0);
        let last = counts.iter().rposition(|c| *c > 0).unwrap_or(0);
        for i in first..=last {
            let (_, _, label) = BUCKETS[i];
            let percentage = percentages[i];
            let bar =
                Self::render_bar_from_percentage(percentage, max_percentage, HISTOGRAM_BAR_WIDTH);
            println!(
                "  {}:  {:30} {} ({:>5} replies)",
                Self::colorize_label(label, percentage),
                bar,
                Self::format_percentage(percentage),
                counts[i]
            );
        }
        Ok(())
    }
}
