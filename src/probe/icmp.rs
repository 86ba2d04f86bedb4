//! ICMP echo probing.

use crate::monitor::error::{PingError, Result};
use crate::monitor::model::{ProbeOutcome, SequenceNumber, Target};
use crate::probe::tcp::classify_io;
use crate::probe::{ProbeMethod, Prober};
use futures::future::BoxFuture;
use std::io;
use std::net::IpAddr;
use std::time::Duration;
use surge_ping::{Client, Config, PingIdentifier, PingSequence, SurgeError, ICMP};
use tracing::{debug, info, trace};

/// Size of the echo payload in bytes
pub const PAYLOAD_SIZE: usize = 16;

const PAYLOAD_MARKER: &[u8; 8] = b"RUSTYPNG";

/// Echo payload: little-endian sequence number followed by a fixed marker.
pub fn echo_payload(seq: SequenceNumber) -> [u8; PAYLOAD_SIZE] {
    let mut buf = [0u8; PAYLOAD_SIZE];
    buf[..8].copy_from_slice(&seq.0.to_le_bytes());
    buf[8..].copy_from_slice(PAYLOAD_MARKER);
    buf
}

/// Sends ICMP echo requests through one socket per address family.
#[derive(Clone)]
pub struct IcmpProber {
    v4: Option<Client>,
    v6: Option<Client>,
    ident: PingIdentifier,
}

impl IcmpProber {
    /// Open ICMP sockets for the address families used by `targets`.
    ///
    /// Fails when the OS refuses an ICMP socket, typically for lack of
    /// privilege.
    pub fn for_targets(targets: &[Target]) -> Result<Self> {
        let want_v4 = targets.iter().any(|t| t.ip.is_ipv4());
        let want_v6 = targets.iter().any(|t| t.ip.is_ipv6());

        let v4 = if want_v4 {
            Some(Self::open(Config::default(), "IPv4")?)
        } else {
            None
        };
        let v6 = if want_v6 {
            Some(Self::open(Config::builder().kind(ICMP::V6).build(), "IPv6")?)
        } else {
            None
        };

        let ident = PingIdentifier(rand::random());
        info!(ident = ident.0, ipv4 = want_v4, ipv6 = want_v6, "ICMP sockets opened");
        Ok(Self { v4, v6, ident })
    }

    fn open(config: Config, family: &str) -> Result<Client> {
        Client::new(&config).map_err(|e| {
            debug!(family, error = %e, "Failed to open ICMP socket");
            let hint = if e.kind() == io::ErrorKind::PermissionDenied {
                " (raw sockets need elevated privileges)"
            } else {
                ""
            };
            PingError::Probe(format!("cannot open {} ICMP socket: {}{}", family, e, hint))
        })
    }
}

impl Prober for IcmpProber {
    fn method(&self) -> ProbeMethod {
        ProbeMethod::Icmp
    }

    fn probe(
        &self,
        ip: IpAddr,
        seq: SequenceNumber,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<ProbeOutcome>> {
        let client = match ip {
            IpAddr::V4(_) => self.v4.clone(),
            IpAddr::V6(_) => self.v6.clone(),
        };
        let ident = self.ident;

        Box::pin(async move {
            let client = client.ok_or_else(|| {
                PingError::Probe(format!("no ICMP socket for the address family of {}", ip))
            })?;

            let mut pinger = client.pinger(ip, ident).await;
            pinger.timeout(timeout);

            // the ICMP sequence field is 16 bits wide
            let icmp_seq = PingSequence(seq.0 as u16);
            let payload = echo_payload(seq);
            trace!(%ip, sequence = seq.0, "Sending ICMP echo request");

            match pinger.ping(icmp_seq, &payload).await {
                Ok((_reply, rtt)) => {
                    trace!(%ip, sequence = seq.0, rtt_us = rtt.as_micros(), "ICMP echo reply");
                    Ok(ProbeOutcome::Reply(rtt))
                }
                Err(SurgeError::Timeout { .. }) => {
                    debug!(%ip, sequence = seq.0, "ICMP echo timed out");
                    Ok(ProbeOutcome::Timeout)
                }
                Err(SurgeError::IOError(e)) if e.kind() == io::ErrorKind::PermissionDenied => {
                    Err(PingError::Probe(format!("ICMP send not permitted: {}", e)))
                }
                Err(SurgeError::IOError(e)) => {
                    debug!(%ip, sequence = seq.0, error = %e, "ICMP echo failed");
                    Ok(classify_io(&e))
                }
                Err(e) => {
                    debug!(%ip, sequence = seq.0, error = %e, "ICMP echo failed");
                    Ok(ProbeOutcome::Error(e.to_string()))
                }
            }
        })
    }
}
