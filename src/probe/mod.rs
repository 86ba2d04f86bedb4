//! Network probes: ICMP echo, TCP connect, and the automatic fallback between them.

pub mod fallback;
pub mod icmp;
pub mod tcp;

pub use fallback::{fallback_notice, FallbackProber};
pub use icmp::IcmpProber;
pub use tcp::TcpProber;

use crate::monitor::error::Result;
use crate::monitor::model::{ProbeOutcome, SequenceNumber, Target};
use crate::monitor::session::NoticeBoard;
use clap::ValueEnum;
use futures::future::BoxFuture;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Trait for sending one echo-style probe to a host
pub trait Prober: Send + Sync {
    /// The method currently used for probing
    fn method(&self) -> ProbeMethod;

    /// Probe `ip` once, resolving within `timeout`.
    ///
    /// `Ok` carries a valid sample outcome, losses included. `Err` means the
    /// method itself is unusable (for example, ICMP without privileges).
    fn probe(
        &self,
        ip: IpAddr,
        seq: SequenceNumber,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<ProbeOutcome>>;
}

/// How the user asked us to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProbeMode {
    /// ICMP, switching to TCP connect when ICMP is not permitted
    Auto,
    /// ICMP only; missing privileges are fatal
    Icmp,
    /// TCP connect only
    Tcp,
}

/// The method actually in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    Icmp,
    Tcp { port: u16 },
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMethod::Icmp => f.write_str("icmp"),
            ProbeMethod::Tcp { port } => write!(f, "tcp/{}", port),
        }
    }
}

/// Build the prober for `mode`.
///
/// In auto mode a failure to open ICMP sockets is not an error: the notice is
/// posted once and TCP probing is used from the start.
pub fn build_prober(
    mode: ProbeMode,
    port: u16,
    targets: &[Target],
    notices: &Arc<NoticeBoard>,
) -> Result<Arc<dyn Prober>> {
    let tcp = TcpProber::new(port);
    let prober: Arc<dyn Prober> = match mode {
        ProbeMode::Tcp => Arc::new(tcp),
        ProbeMode::Icmp => Arc::new(IcmpProber::for_targets(targets)?),
        ProbeMode::Auto => match IcmpProber::for_targets(targets) {
            Ok(icmp) => Arc::new(FallbackProber::new(icmp, tcp, Arc::clone(notices))),
            Err(e) => {
                warn!(error = %e, "Falling back to TCP probing");
                notices.post(fallback_notice(&e, tcp.method()));
                Arc::new(tcp)
            }
        },
    };
    info!(?mode, method = %prober.method(), "Prober ready");
    Ok(prober)
}


#[cfg(test)]
pub use tests::MockProber;
