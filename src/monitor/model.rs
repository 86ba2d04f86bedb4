//! Core data types shared by the prober, the sample store and the dashboard.

use crate::monitor::error::{PingError, Result};
use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info};

/// Per-target probe sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a target in the session's target list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub usize);

/// A monitored endpoint. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// The address exactly as the user typed it.
    pub address: String,
    pub ip: IpAddr,
    pub label: String,
    /// Time the resolver took; `None` for IP literals.
    pub dns_time: Option<Duration>,
}

impl Target {
    pub fn new(address: impl Into<String>, ip: IpAddr) -> Self {
        let address = address.into();
        let label = if address == ip.to_string() {
            address.clone()
        } else {
            format!("{} ({})", address, ip)
        };
        Self {
            address,
            ip,
            label,
            dns_time: None,
        }
    }

    /// Resolve a hostname or IP literal.
    ///
    /// IP literals skip DNS entirely. For hostnames the first address returned by
    /// the system resolver wins, which matches what `ping` does.
    pub async fn resolve(address: &str) -> Result<Self> {
        if let Ok(ip) = address.parse::<IpAddr>() {
            debug!(address, "Target is an IP literal");
            return Ok(Self::new(address, ip));
        }

        debug!(address, "Resolving target");
        let started = Instant::now();
        let mut addrs = tokio::net::lookup_host((address, 0))
            .await
            .map_err(|e| PingError::Resolve {
                host: address.to_string(),
                reason: e.to_string(),
            })?;
        let ip = addrs
            .next()
            .ok_or_else(|| PingError::Resolve {
                host: address.to_string(),
                reason: "no addresses returned".into(),
            })?
            .ip();
        let dns_time = started.elapsed();
        info!(address, ip = %ip, dns_ms = dns_time.as_secs_f64() * 1000.0, "Resolved target");
        Ok(Self {
            dns_time: Some(dns_time),
            ..Self::new(address, ip)
        })
    }
}

/// Why a probe produced no latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    Unreachable,
    Error,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Unreachable => "unreachable",
            FailureKind::Error => "error",
        };
        f.write_str(s)
    }
}

/// Result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reply(Duration),
    Timeout,
    Unreachable(String),
    Error(String),
}

impl ProbeOutcome {
    pub fn latency(&self) -> Option<Duration> {
        match self {
            ProbeOutcome::Reply(rtt) => Some(*rtt),
            _ => None,
        }
    }

    pub fn is_loss(&self) -> bool {
        !matches!(self, ProbeOutcome::Reply(_))
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            ProbeOutcome::Reply(_) => None,
            ProbeOutcome::Timeout => Some(FailureKind::Timeout),
            ProbeOutcome::Unreachable(_) => Some(FailureKind::Unreachable),
            ProbeOutcome::Error(_) => Some(FailureKind::Error),
        }
    }

    /// Short status word used in logs and the CSV output.
    pub fn status(&self) -> &'static str {
        match self {
            ProbeOutcome::Reply(_) => "reply",
            ProbeOutcome::Timeout => "timeout",
            ProbeOutcome::Unreachable(_) => "unreachable",
            ProbeOutcome::Error(_) => "error",
        }
    }
}

/// One recorded probe outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub sequence: SequenceNumber,
    /// When the probe was sent.
    pub sent_at: Instant,
    /// Wall clock time of the send, for logs.
    pub wall_time: SystemTime,
    pub outcome: ProbeOutcome,
}

impl Sample {
    pub fn new(sequence: SequenceNumber, outcome: ProbeOutcome) -> Self {
        Self {
            sequence,
            sent_at: Instant::now(),
            wall_time: SystemTime::now(),
            outcome,
        }
    }

    pub fn latency(&self) -> Option<Duration> {
        self.outcome.latency()
    }

    /// Latency in fractional milliseconds.
    pub fn latency_ms(&self) -> Option<f64> {
        self.latency().map(|d| d.as_secs_f64() * 1000.0)
    }

    pub fn is_loss(&self) -> bool {
        self.outcome.is_loss()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_target_label_for_ip_literal() {
        let target = Target::new("10.0.0.1", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(target.label, "10.0.0.1");
    }

    #[test]
    fn test_target_label_for_hostname() {
        let target = Target::new("router.lan", IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)));
        assert_eq!(target.label, "router.lan (192.168.1.1)");
    }

    #[tokio::test]
    async fn test_resolve_ip_literal_skips_dns() -> Result<()> {
        let target = Target::resolve("127.0.0.1").await?;
        assert_eq!(target.ip, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(target.dns_time, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_hostname_records_dns_time() -> Result<()> {
        let target = Target::resolve("localhost").await?;
        assert!(target.ip.is_loopback());
        assert!(target.dns_time.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_invalid_host_fails() {
        let result = Target::resolve("no-such-host.invalid").await;
        assert!(matches!(result, Err(PingError::Resolve { .. })));
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(ProbeOutcome::Reply(Duration::from_millis(3)).failure(), None);
        assert_eq!(ProbeOutcome::Timeout.failure(), Some(FailureKind::Timeout));
        assert!(ProbeOutcome::Unreachable("no route".into()).is_loss());
        assert_eq!(ProbeOutcome::Error("boom".into()).status(), "error");
    }
}
