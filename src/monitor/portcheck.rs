//! On-demand TCP checks against the active target: the two web ports, or a
//! scan of well-known service ports.

use crate::monitor::constants::{
    COMMON_PORTS, PORT_CHECK_CONCURRENCY, PORT_SCAN_TIMEOUT, WEB_CHECK_PORTS, WEB_CHECK_TIMEOUT,
};
use crate::monitor::model::TargetId;
use crate::monitor::session::Session;
use crate::probe::tcp::{connect, ConnectResult};
use futures::StreamExt;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Which ports a check covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortCheck {
    /// HTTP and HTTPS only
    Web,
    /// Every port in [`COMMON_PORTS`]
    Scan,
}

impl PortCheck {
    pub fn ports(self) -> Vec<u16> {
        match self {
            PortCheck::Web => WEB_CHECK_PORTS.to_vec(),
            PortCheck::Scan => COMMON_PORTS.iter().map(|(port, _)| *port).collect(),
        }
    }

    pub fn timeout(self) -> Duration {
        match self {
            PortCheck::Web => WEB_CHECK_TIMEOUT,
            PortCheck::Scan => PORT_SCAN_TIMEOUT,
        }
    }
}

impl fmt::Display for PortCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortCheck::Web => f.write_str("Web check"),
            PortCheck::Scan => f.write_str("Port scan"),
        }
    }
}

/// Name of the service usually listening on `port`.
pub fn service_name(port: u16) -> Option<&'static str> {
    COMMON_PORTS
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, name)| *name)
}

/// Result of connecting to one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortStatus {
    Pending,
    Open(Duration),
    Refused,
    Timeout,
    Error(String),
}

impl fmt::Display for PortStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortStatus::Pending => f.write_str("checking"),
            PortStatus::Open(rtt) => write!(f, "open {:.1}ms", rtt.as_secs_f64() * 1000.0),
            PortStatus::Refused => f.write_str("closed"),
            PortStatus::Timeout => f.write_str("timeout"),
            PortStatus::Error(e) => write!(f, "error: {}", e),
        }
    }
}

/// Connect timings for each checked port, in check order.
#[derive(Debug, Clone)]
pub struct PortCheckReport {
    pub kind: PortCheck,
    pub ports: Vec<(u16, PortStatus)>,
    /// `None` while the check is still running.
    pub completed_at: Option<SystemTime>,
    /// Which run of the target's checks produced this report
    pub(crate) generation: u64,
}

impl PortCheckReport {
    pub fn pending(kind: PortCheck, ports: &[u16]) -> Self {
        Self {
            kind,
            ports: ports.iter().map(|p| (*p, PortStatus::Pending)).collect(),
            completed_at: None,
            generation: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Ports with a final status.
    pub fn checked(&self) -> usize {
        self.ports
            .iter()
            .filter(|(_, status)| *status != PortStatus::Pending)
            .count()
    }

    pub fn open_ports(&self) -> impl Iterator<Item = (u16, Duration)> + '_ {
        self.ports.iter().filter_map(|(port, status)| match status {
            PortStatus::Open(rtt) => Some((*port, *rtt)),
            _ => None,
        })
    }
}

async fn check_port(ip: IpAddr, port: u16, timeout: Duration) -> PortStatus {
    let status = match connect(SocketAddr::new(ip, port), timeout).await {
        ConnectResult::Connected(rtt) => PortStatus::Open(rtt),
        ConnectResult::Refused(_) => PortStatus::Refused,
        ConnectResult::TimedOut => PortStatus::Timeout,
        ConnectResult::Failed(e) => PortStatus::Error(e.to_string()),
    };
    debug!(%ip, port, %status, "Port checked");
    status
}

/// Time one TCP handshake per pending port, a few at a time.
///
/// `on_progress` sees the report after every finished port; the returned
/// report is complete.
pub async fn check_ports(
    ip: IpAddr,
    mut report: PortCheckReport,
    timeout: Duration,
    mut on_progress: impl FnMut(&PortCheckReport),
) -> PortCheckReport {
    let ports: Vec<u16> = report.ports.iter().map(|(port, _)| *port).collect();
    let mut results = futures::stream::iter(ports.into_iter().enumerate())
        .map(move |(i, port)| async move { (i, check_port(ip, port, timeout).await) })
        .buffer_unordered(PORT_CHECK_CONCURRENCY);

    while let Some((i, status)) = results.next().await {
        if let Some(entry) = report.ports.get_mut(i) {
            entry.1 = status;
        }
        on_progress(&report);
    }
    report.completed_at = Some(SystemTime::now());
    report
}

/// Run a port check for `id` in the background, publishing progress on its
/// monitor. A newer check on the same target supersedes this one. Returns
/// `None` for an unknown target.
pub fn spawn_port_check(
    session: &Arc<Session>,
    id: TargetId,
    kind: PortCheck,
) -> Option<JoinHandle<()>> {
    let monitor = session.target(id)?;
    let report = monitor.begin_port_check(kind);
    let ip = monitor.target.ip;
    info!(host = %monitor.target.label, check = %kind, ports = report.ports.len(), "Starting port check");

    let session = Arc::clone(session);
    Some(tokio::spawn(async move {
        let cancel = session.cancel_token().clone();
        let publish = |report: &PortCheckReport| {
            if let Some(monitor) = session.target(id) {
                monitor.update_port_check(report);
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => {}
            report = check_ports(ip, report, kind.timeout(), &publish) => {
                publish(&report);
                info!(
                    check = %kind,
                    open = report.open_ports().count(),
                    "Port check finished"
                );
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::error::Result;
    use crate::monitor::model::Target;
    use crate::monitor::session::{NoticeBoard, SessionSettings};
    use crate::probe::MockProber;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    async fn open_and_closed_ports() -> Result<(u16, u16)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let open = listener.local_addr()?.port();
        tokio::spawn(async move {
            while let Ok((_stream, _)) = listener.accept().await {}
        });
        let closed = {
            let l = TcpListener::bind("127.0.0.1:0").await?;
            l.local_addr()?.port()
        };
        Ok((open, closed))
    }

    #[tokio::test]
    async fn test_check_ports_open_and_closed() -> Result<()> {
        let (open, closed) = open_and_closed_ports().await?;

        let mut updates = 0;
        let report = check_ports(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            PortCheckReport::pending(PortCheck::Web, &[open, closed]),
            Duration::from_secs(1),
            |_| updates += 1,
        )
        .await;

        assert!(report.is_complete());
        assert_eq!(updates, 2);
        assert_eq!(report.checked(), 2);
        assert!(matches!(report.ports[0], (p, PortStatus::Open(_)) if p == open));
        assert_eq!(report.ports[1], (closed, PortStatus::Refused));
        assert_eq!(report.open_ports().map(|(p, _)| p).collect::<Vec<_>>(), vec![open]);
        Ok(())
    }

    #[tokio::test]
    async fn test_scan_keeps_port_order_with_bounded_concurrency() -> Result<()> {
        let (open, closed) = open_and_closed_ports().await?;
        let ports: Vec<u16> = std::iter::repeat(closed)
            .take(PORT_CHECK_CONCURRENCY * 2)
            .chain([open])
            .collect();

        let report = check_ports(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            PortCheckReport::pending(PortCheck::Scan, &ports),
            Duration::from_secs(1),
            |_| {},
        )
        .await;

        assert_eq!(report.ports.len(), ports.len());
        assert!(report.ports[..ports.len() - 1]
            .iter()
            .all(|entry| *entry == (closed, PortStatus::Refused)));
        assert!(matches!(report.ports.last(), Some((p, PortStatus::Open(_))) if *p == open));
        Ok(())
    }

    #[tokio::test]
    async fn test_newer_check_supersedes_older() -> Result<()> {
        let session = Session::new(
            vec![Target::new("127.0.0.1", IpAddr::V4(Ipv4Addr::LOCALHOST))],
            Arc::new(MockProber::new()),
            Arc::new(NoticeBoard::new()),
            SessionSettings {
                interval: Duration::from_secs(1),
                timeout: Duration::from_secs(1),
                capacity: 10,
                count: None,
            },
        );
        let monitor = &session.targets()[0];

        let web = monitor.begin_port_check(PortCheck::Web);
        let scan = monitor.begin_port_check(PortCheck::Scan);
        monitor.update_port_check(&PortCheckReport {
            completed_at: Some(SystemTime::now()),
            ..web
        });

        let shown = monitor.port_check().expect("a check was started");
        assert_eq!(shown.kind, PortCheck::Scan);
        assert_eq!(shown.ports.len(), COMMON_PORTS.len());
        assert!(!shown.is_complete());

        monitor.update_port_check(&PortCheckReport {
            completed_at: Some(SystemTime::now()),
            ..scan
        });
        assert!(monitor.port_check().is_some_and(|r| r.is_complete()));
        Ok(())
    }

    #[test]
    fn test_scan_covers_common_services() {
        let ports = PortCheck::Scan.ports();
        assert_eq!(ports.len(), COMMON_PORTS.len());
        assert!(ports.contains(&22) && ports.contains(&443) && ports.contains(&5432));
        assert_eq!(PortCheck::Web.ports(), vec![80, 443]);
        assert_eq!(service_name(22), Some("ssh"));
        assert_eq!(service_name(4242), None);
    }

    #[test]
    fn test_pending_report() {
        let report = PortCheckReport::pending(PortCheck::Web, &[80, 443]);
        assert!(!report.is_complete());
        assert_eq!(report.checked(), 0);
        assert!(report.ports.iter().all(|(_, s)| *s == PortStatus::Pending));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(PortStatus::Refused.to_string(), "closed");
        assert_eq!(
            PortStatus::Open(Duration::from_micros(12_340)).to_string(),
            "open 12.3ms"
        );
        assert_eq!(PortCheck::Scan.to_string(), "Port scan");
    }
}
