use crate::monitor::constants::*;
use crate::monitor::error::{PingError, Result};
use crate::monitor::model::Sample;
use hdrhistogram::Histogram;
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Connection quality grade derived from recent latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Unknown,
    Offline,
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Quality {
    /// Grade a window: offline if the newest sample is a loss, otherwise by the
    /// rolling average of recent replies.
    pub fn grade(latest_is_loss: Option<bool>, recent_avg_ms: Option<f64>) -> Self {
        match (latest_is_loss, recent_avg_ms) {
            (None, _) => Quality::Unknown,
            (Some(true), _) => Quality::Offline,
            (Some(false), None) => Quality::Unknown,
            (Some(false), Some(avg)) if avg < EXCELLENT_LATENCY_MS => Quality::Excellent,
            (Some(false), Some(avg)) if avg < GOOD_LATENCY_MS => Quality::Good,
            (Some(false), Some(avg)) if avg < FAIR_LATENCY_MS => Quality::Fair,
            (Some(false), Some(_)) => Quality::Poor,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Quality::Unknown => "UNKNOWN",
            Quality::Offline => "OFFLINE",
            Quality::Excellent => "EXCELLENT",
            Quality::Good => "GOOD",
            Quality::Fair => "FAIR",
            Quality::Poor => "POOR",
        };
        f.write_str(s)
    }
}

/// Statistics over one window of samples, backed by an HDR histogram in microseconds.
pub struct Statistics {
    hist: Histogram<u64>,
    real_min: Duration,
    real_max: Duration,
    clamped_count: usize,
    total: usize,
    lost: usize,
    jitter_ms: f64,
    current: Option<Duration>,
    recent_avg_ms: Option<f64>,
    quality: Quality,
}

impl Statistics {
    /// Compute statistics over samples ordered oldest to newest.
    pub fn new<'a>(samples: impl IntoIterator<Item = &'a Sample>) -> Result<Self> {
        let mut hist = Histogram::<u64>::new_with_bounds(
            HISTOGRAM_LOW_BOUND_US,
            HISTOGRAM_HIGH_BOUND_US,
            HISTOGRAM_SIGNIFICANT_DIGITS,
        )
        .map_err(|e| PingError::Statistics(format!("Failed to create histogram: {}", e)))?;

        let mut real_min = Duration::MAX;
        let mut real_max = Duration::ZERO;
        let mut clamped_count = 0;
        let mut total = 0;
        let mut lost = 0;
        let mut replies_ms = Vec::new();
        let mut latest_is_loss = None;
        let mut last_reply = None;

        for sample in samples {
            total += 1;
            latest_is_loss = Some(sample.is_loss());

            let Some(rtt) = sample.latency() else {
                lost += 1;
                continue;
            };

            real_min = real_min.min(rtt);
            real_max = real_max.max(rtt);
            last_reply = Some(rtt);
            replies_ms.push(rtt.as_secs_f64() * 1000.0);

            let micros = u64::try_from(rtt.as_micros()).unwrap_or(u64::MAX);
            let clamped = micros.clamp(HISTOGRAM_LOW_BOUND_US, HISTOGRAM_HIGH_BOUND_US);
            if clamped != micros {
                clamped_count += 1;
            }
            hist.record(clamped).map_err(|e| {
                warn!(latency_us = micros, error = %e, "Failed to record latency");
                PingError::Statistics(format!("Failed to record latency: {}", e))
            })?;
        }

        let jitter_ms = if replies_ms.len() > 1 {
            let mean = replies_ms.iter().sum::<f64>() / replies_ms.len() as f64;
            let variance = replies_ms.iter().map(|x| (x - mean).powi(2)).sum::<f64>()
                / replies_ms.len() as f64;
            variance.sqrt()
        } else {
            0.0
        };

        let recent: Vec<f64> = replies_ms.iter().rev().take(RECENT_WINDOW).copied().collect();
        let recent_avg_ms = if recent.is_empty() {
            None
        } else {
            Some(recent.iter().sum::<f64>() / recent.len() as f64)
        };

        let current = match latest_is_loss {
            Some(false) => last_reply,
            _ => None,
        };

        let quality = Quality::grade(latest_is_loss, recent_avg_ms);

        if clamped_count > 0 {
            debug!(
                clamped_count,
                total_count = replies_ms.len(),
                "Some latency values were clamped to histogram bounds"
            );
        }

        let stats = Self {
            hist,
            real_min: if real_min == Duration::MAX {
                Duration::ZERO
            } else {
                real_min
            },
            real_max,
            clamped_count,
            total,
            lost,
            jitter_ms,
            current,
            recent_avg_ms,
            quality,
        };

        trace!(
            total,
            lost,
            mean_ms = stats.mean_ms(),
            jitter_ms,
            quality = %quality,
            "Statistics calculated"
        );

        Ok(stats)
    }

    /// Mean reply latency in milliseconds, 0 without replies.
    pub fn mean_ms(&self) -> f64 {
        if self.hist.is_empty() {
            0.0
        } else {
            self.hist.mean() / 1000.0
        }
    }

    /// Fastest reply (unclamped)
    pub fn min(&self) -> Duration {
        self.real_min
    }

    /// Slowest reply (unclamped)
    pub fn max(&self) -> Duration {
        self.real_max
    }

    /// Latency at a quantile, in milliseconds
    pub fn percentile_ms(&self, quantile: f64) -> f64 {
        self.hist.value_at_quantile(quantile) as f64 / 1000.0
    }

    /// Population standard deviation of reply latencies, in milliseconds
    pub fn jitter_ms(&self) -> f64 {
        self.jitter_ms
    }

    /// Fraction of samples in the window that were lost, in 0.0..=1.0
    pub fn loss_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.lost as f64 / self.total as f64
        }
    }

    /// Latency of the newest sample, `None` if it was lost
    pub fn current(&self) -> Option<Duration> {
        self.current
    }

    /// Average of the most recent replies, in milliseconds
    pub fn recent_avg_ms(&self) -> Option<f64> {
        self.recent_avg_ms
    }

    /// 100 minus jitter as a percentage of the mean, clamped to 0..=100
    pub fn stability(&self) -> f64 {
        let mean = self.mean_ms();
        if mean > 0.0 {
            (100.0 - (self.jitter_ms / mean * 100.0)).clamp(0.0, 100.0)
        } else {
            100.0
        }
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    /// Number of values that were clamped to the histogram bounds
    pub fn clamped_count(&self) -> usize {
        self.clamped_count
    }

    /// Number of replies in the window
    pub fn count(&self) -> u64 {
        self.hist.len()
    }

    /// Number of samples in the window, replies and losses
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn lost(&self) -> usize {
        self.lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::model::{ProbeOutcome, SequenceNumber};

    fn samples(outcomes: &[Option<u64>]) -> Vec<Sample> {
        outcomes
            .iter()
            .enumerate()
            .map(|(i, ms)| {
                let outcome = match ms {
                    Some(ms) => ProbeOutcome::Reply(Duration::from_millis(*ms)),
                    None => ProbeOutcome::Timeout,
                };
                Sample::new(SequenceNumber(i as u64 + 1), outcome)
            })
            .collect()
    }

    #[test]
    fn test_statistics_calculation() -> Result<()> {
        let window = samples(&[Some(10), Some(20), Some(30), Some(40), Some(50)]);
        let stats = Statistics::new(&window)?;

        assert_eq!(stats.min(), Duration::from_millis(10));
        assert_eq!(stats.max(), Duration::from_millis(50));
        assert!((stats.mean_ms() - 30.0).abs() < 0.1);
        assert_eq!(stats.count(), 5);
        assert_eq!(stats.loss_rate(), 0.0);
        // population stddev of 10..50 step 10
        assert!((stats.jitter_ms() - 200.0f64.sqrt()).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_loss_rate_and_current() -> Result<()> {
        let window = samples(&[Some(10), None, Some(12), None]);
        let stats = Statistics::new(&window)?;

        assert_eq!(stats.total(), 4);
        assert_eq!(stats.lost(), 2);
        assert!((stats.loss_rate() - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.current(), None);
        assert_eq!(stats.quality(), Quality::Offline);
        Ok(())
    }

    #[test]
    fn test_empty_window() -> Result<()> {
        let empty: Vec<Sample> = Vec::new();
        let stats = Statistics::new(&empty)?;
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.mean_ms(), 0.0);
        assert_eq!(stats.min(), Duration::ZERO);
        assert_eq!(stats.loss_rate(), 0.0);
        assert_eq!(stats.stability(), 100.0);
        assert_eq!(stats.quality(), Quality::Unknown);
        Ok(())
    }

    #[test]
    fn test_recent_average_uses_last_replies_only() -> Result<()> {
        let mut outcomes = vec![Some(500); 5];
        outcomes.extend(std::iter::repeat(Some(10)).take(RECENT_WINDOW));
        let stats = Statistics::new(&samples(&outcomes))?;

        let recent = stats.recent_avg_ms().unwrap_or_default();
        assert!((recent - 10.0).abs() < 1e-9);
        assert_eq!(stats.quality(), Quality::Excellent);
        Ok(())
    }

    #[test]
    fn test_quality_grades() {
        assert_eq!(Quality::grade(Some(false), Some(29.9)), Quality::Excellent);
        assert_eq!(Quality::grade(Some(false), Some(30.0)), Quality::Good);
        assert_eq!(Quality::grade(Some(false), Some(150.0)), Quality::Fair);
        assert_eq!(Quality::grade(Some(false), Some(250.0)), Quality::Poor);
        assert_eq!(Quality::grade(Some(true), Some(5.0)), Quality::Offline);
        assert_eq!(Quality::grade(None, None), Quality::Unknown);
    }

    #[test]
    fn test_huge_latency_is_clamped() -> Result<()> {
        let window = vec![Sample::new(
            SequenceNumber(1),
            ProbeOutcome::Reply(Duration::from_secs(120)),
        )];
        let stats = Statistics::new(&window)?;
        assert_eq!(stats.clamped_count(), 1);
        assert_eq!(stats.max(), Duration::from_secs(120));
        Ok(())
    }
}
