//! Probe cadence.
//!
//! One task per target ticks at the session interval and dispatches probes
//! without waiting for earlier ones, with at most one probe in flight per
//! target. Completed probes are recorded into the target's store and forwarded
//! to the sample sink, if any.

use crate::monitor::model::{ProbeOutcome, Sample, SequenceNumber, TargetId};
use crate::monitor::session::Session;
use crate::monitor::sink::SampleEvent;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

/// Starts the per-target probe loops.
pub struct Scheduler {
    session: Arc<Session>,
    sink: Option<mpsc::UnboundedSender<SampleEvent>>,
}

impl Scheduler {
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            sink: None,
        }
    }

    /// Forward every recorded sample to `sink`.
    pub fn with_sink(mut self, sink: mpsc::UnboundedSender<SampleEvent>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn spawn(self) -> SchedulerHandle {
        let mut tasks = JoinSet::new();
        for monitor in self.session.targets() {
            tasks.spawn(run_target(
                Arc::clone(&self.session),
                monitor.id,
                self.sink.clone(),
            ));
        }
        info!(
            targets = self.session.targets().len(),
            interval_ms = self.session.state().interval().as_millis(),
            "Scheduler started"
        );
        SchedulerHandle { tasks }
    }
}

/// Running probe loops.
pub struct SchedulerHandle {
    tasks: JoinSet<()>,
}

impl SchedulerHandle {
    /// Wait for every probe loop to end: on shutdown, or once each target
    /// reached its probe count.
    pub async fn join(mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Probe loop ended abnormally");
            }
        }
        debug!("Scheduler stopped");
    }
}

fn ticker(period: Duration, immediate: bool) -> Interval {
    let start = if immediate {
        time::Instant::now()
    } else {
        time::Instant::now() + period
    };
    let mut ticker = time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn run_target(
    session: Arc<Session>,
    id: TargetId,
    sink: Option<mpsc::UnboundedSender<SampleEvent>>,
) {
    let Some(monitor) = session.target(id) else {
        return;
    };
    let cancel = session.cancel_token().clone();
    let count = session.settings().count;
    let mut interval_rx = session.state().watch_interval();
    let mut ticker = ticker(*interval_rx.borrow_and_update(), true);
    let mut next_seq = monitor
        .store
        .snapshot()
        .last_sequence()
        .map_or(SequenceNumber(1), SequenceNumber::next);
    let mut in_flight: Option<JoinHandle<()>> = None;
    let mut completed = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let period = *interval_rx.borrow_and_update();
                ticker = self::ticker(period, false);
                debug!(host = %monitor.target.label, interval_ms = period.as_millis(), "Probe interval updated");
            }
            _ = ticker.tick() => {
                if session.state().is_paused() {
                    continue;
                }
                if in_flight.as_ref().is_some_and(|h| !h.is_finished()) {
                    monitor.note_skipped_tick();
                    trace!(host = %monitor.target.label, "Probe still in flight; tick skipped");
                    continue;
                }

                let seq = next_seq;
                next_seq = seq.next();
                let dispatched = monitor.note_dispatch();
                in_flight = Some(tokio::spawn(probe_once(
                    Arc::clone(&session),
                    id,
                    seq,
                    sink.clone(),
                )));

                if count.is_some_and(|n| dispatched >= n) {
                    completed = true;
                    break;
                }
            }
        }
    }

    if let Some(handle) = in_flight {
        finish_in_flight(&session, handle, completed).await;
    }
    if completed {
        monitor.mark_complete();
        info!(host = %monitor.target.label, probes = monitor.dispatched(), "Probe count reached");
    }
}

/// Wait for the last probe. After the final counted probe it may run to its
/// own timeout; on shutdown it gets one timeout interval before it is aborted.
async fn finish_in_flight(session: &Session, mut handle: JoinHandle<()>, completed: bool) {
    if completed {
        tokio::select! {
            _ = &mut handle => return,
            _ = session.cancel_token().cancelled() => {}
        }
    }

    let grace = session.settings().timeout;
    if time::timeout(grace, &mut handle).await.is_err() {
        handle.abort();
        warn!(grace_ms = grace.as_millis(), "Aborted in-flight probe after grace period");
    }
}

async fn probe_once(
    session: Arc<Session>,
    id: TargetId,
    seq: SequenceNumber,
    sink: Option<mpsc::UnboundedSender<SampleEvent>>,
) {
    let Some(monitor) = session.target(id) else {
        return;
    };
    let timeout = session.settings().timeout;
    let ip = monitor.target.ip;
    let sent_at = Instant::now();
    let wall_time = SystemTime::now();

    let outcome = match time::timeout(timeout, session.prober().probe(ip, seq, timeout)).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            warn!(host = %monitor.target.label, sequence = seq.0, error = %e, "Probe failed");
            ProbeOutcome::Error(e.to_string())
        }
        Err(_) => ProbeOutcome::Timeout,
    };
    trace!(
        host = %monitor.target.label,
        sequence = seq.0,
        status = outcome.status(),
        "Probe completed"
    );

    monitor.note_outcome(&outcome);
    let sample = Sample {
        sequence: seq,
        sent_at,
        wall_time,
        outcome,
    };

    if let Err(e) = monitor.store.record(sample.clone()) {
        warn!(host = %monitor.target.label, error = %e, "Sample rejected");
        return;
    }

    if let Some(sink) = sink {
        let event = SampleEvent {
            target: id,
            address: monitor.target.address.clone(),
            ip,
            sample,
        };
        if sink.send(event).is_err() {
            trace!("Sample sink closed");
        }
    }
}
