use crate::monitor::error::{PingError, Result};
use crate::monitor::model::{ProbeOutcome, SequenceNumber};
use crate::monitor::session::NoticeBoard;
use crate::probe::{ProbeMethod, Prober};
use futures::future::BoxFuture;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Uses `primary` until it reports that it cannot probe at all, then switches
/// to `fallback` for good. The switch posts exactly one notice.
pub struct FallbackProber<P, F> {
    primary: Arc<P>,
    fallback: Arc<F>,
    degraded: Arc<AtomicBool>,
    notices: Arc<NoticeBoard>,
}

impl<P: Prober + 'static, F: Prober + 'static> FallbackProber<P, F> {
    pub fn new(primary: P, fallback: F, notices: Arc<NoticeBoard>) -> Self {
        Self {
            primary: Arc::new(primary),
            fallback: Arc::new(fallback),
            degraded: Arc::new(AtomicBool::new(false)),
            notices,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }
}

/// Notice text for a switch to TCP probing.
pub fn fallback_notice(reason: &PingError, method: ProbeMethod) -> String {
    format!("ICMP unavailable ({}); probing with {} instead", reason, method)
}

impl<P: Prober + 'static, F: Prober + 'static> Prober for FallbackProber<P, F> {
    fn method(&self) -> ProbeMethod {
        if self.is_degraded() {
            self.fallback.method()
        } else {
            self.primary.method()
        }
    }

    fn probe(
        &self,
        ip: IpAddr,
        seq: SequenceNumber,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<ProbeOutcome>> {
        if self.is_degraded() {
            return self.fallback.probe(ip, seq, timeout);
        }

        let primary = self.primary.probe(ip, seq, timeout);
        let fallback = Arc::clone(&self.fallback);
        let degraded = Arc::clone(&self.degraded);
        let notices = Arc::clone(&self.notices);

        Box::pin(async move {
            match primary.await {
                Err(PingError::Probe(reason)) => {
                    let err = PingError::Probe(reason);
                    if !degraded.swap(true, Ordering::AcqRel) {
                        let notice = fallback_notice(&err, fallback.method());
                        warn!(error = %err, "Falling back to TCP probing");
                        notices.post(notice);
                    }
                    fallback.probe(ip, seq, timeout).await
                }
                other => other,
            }
        })
    }
}
