//! TCP-connect probing: the handshake round trip stands in for an echo.

use crate::monitor::error::Result;
use crate::monitor::model::{ProbeOutcome, SequenceNumber};
use crate::probe::{ProbeMethod, Prober};
use futures::future::BoxFuture;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// How a single connection attempt ended.
#[derive(Debug)]
pub enum ConnectResult {
    Connected(Duration),
    /// The host answered with a reset.
    Refused(Duration),
    TimedOut,
    Failed(io::Error),
}

/// Attempt one TCP handshake, giving up after `timeout`.
pub async fn connect(addr: SocketAddr, timeout: Duration) -> ConnectResult {
    let start = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => ConnectResult::Connected(start.elapsed()),
        Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionRefused => {
            ConnectResult::Refused(start.elapsed())
        }
        Ok(Err(e)) if e.kind() == io::ErrorKind::TimedOut => ConnectResult::TimedOut,
        Ok(Err(e)) => ConnectResult::Failed(e),
        Err(_) => ConnectResult::TimedOut,
    }
}

/// Map a network error to a loss outcome.
pub fn classify_io(e: &io::Error) -> ProbeOutcome {
    match e.kind() {
        io::ErrorKind::TimedOut => ProbeOutcome::Timeout,
        io::ErrorKind::HostUnreachable
        | io::ErrorKind::NetworkUnreachable
        | io::ErrorKind::NetworkDown
        | io::ErrorKind::AddrNotAvailable => ProbeOutcome::Unreachable(e.to_string()),
        _ => ProbeOutcome::Error(e.to_string()),
    }
}

/// Probes by timing a TCP handshake against a fixed port.
#[derive(Debug, Clone)]
pub struct TcpProber {
    port: u16,
}

impl TcpProber {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Prober for TcpProber {
    fn method(&self) -> ProbeMethod {
        ProbeMethod::Tcp { port: self.port }
    }

    fn probe(
        &self,
        ip: IpAddr,
        seq: SequenceNumber,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<ProbeOutcome>> {
        let addr = SocketAddr::new(ip, self.port);
        Box::pin(async move {
            trace!(%addr, sequence = seq.0, "Sending TCP probe");
            let outcome = match connect(addr, timeout).await {
                ConnectResult::Connected(rtt) | ConnectResult::Refused(rtt) => {
                    ProbeOutcome::Reply(rtt)
                }
                ConnectResult::TimedOut => ProbeOutcome::Timeout,
                ConnectResult::Failed(e) => {
                    debug!(%addr, sequence = seq.0, error = %e, "TCP probe failed");
                    classify_io(&e)
                }
            };
            Ok(outcome)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_open_port_replies() -> Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        tokio::spawn(async move {
            while let Ok((_stream, _)) = listener.accept().await {}
        });

        let prober = TcpProber::new(port);
        let outcome = prober
            .probe(
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                SequenceNumber(1),
                Duration::from_secs(1),
            )
            .await?;
        assert!(matches!(outcome, ProbeOutcome::Reply(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_probe_closed_port_counts_as_reply() -> Result<()> {
        // bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await?;
            listener.local_addr()?.port()
        };

        let prober = TcpProber::new(port);
        let outcome = prober
            .probe(
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                SequenceNumber(1),
                Duration::from_secs(1),
            )
            .await?;
        assert!(matches!(outcome, ProbeOutcome::Reply(_)));
        Ok(())
    }

    #[test]
    fn test_classify_io() {
        let timeout = io::Error::from(io::ErrorKind::TimedOut);
        assert_eq!(classify_io(&timeout), ProbeOutcome::Timeout);

        let unreachable = io::Error::from(io::ErrorKind::HostUnreachable);
        assert!(matches!(classify_io(&unreachable), ProbeOutcome::Unreachable(_)));

        let other = io::Error::from(io::ErrorKind::Other);
        assert!(matches!(classify_io(&other), ProbeOutcome::Error(_)));
    }

    #[test]
    fn test_method_reports_port() {
        assert_eq!(TcpProber::new(443).method(), ProbeMethod::Tcp { port: 443 });
    }
}
