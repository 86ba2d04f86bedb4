//! Process-wide session context.
//!
//! One [`Session`] is built at startup and handed to the scheduler, the
//! dashboard and the input handler. Everything shared between them lives here
//! and is changed only through the methods below.

use crate::monitor::config::Config;
use crate::monitor::constants::*;
use crate::monitor::model::{ProbeOutcome, Target, TargetId};
use crate::monitor::store::SampleStore;
use crate::monitor::portcheck::{PortCheck, PortCheckReport};
use crate::probe::{ProbeMethod, Prober};
use arc_swap::{ArcSwap, ArcSwapOption};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Timing and sizing shared by every target of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub interval: Duration,
    pub timeout: Duration,
    pub capacity: usize,
    /// Stop each target after this many probes.
    pub count: Option<u64>,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.interval,
            timeout: config.timeout,
            capacity: config.capacity,
            count: config.count,
        }
    }
}

/// Messages about degraded capability, shown once to the user.
#[derive(Debug, Default)]
pub struct NoticeBoard {
    current: ArcSwapOption<String>,
    posted: AtomicUsize,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn post(&self, message: impl Into<String>) {
        let message = message.into();
        info!(notice = %message, "Notice posted");
        self.current.store(Some(Arc::new(message)));
        self.posted.fetch_add(1, Ordering::AcqRel);
    }

    pub fn current(&self) -> Option<Arc<String>> {
        self.current.load_full()
    }

    /// Number of notices posted so far.
    pub fn posted(&self) -> usize {
        self.posted.load(Ordering::Acquire)
    }

    /// Latest notice if anything was posted since `seen`; updates `seen`.
    pub fn take_new(&self, seen: &mut usize) -> Option<Arc<String>> {
        let posted = self.posted();
        if posted == *seen {
            return None;
        }
        *seen = posted;
        self.current()
    }
}

/// What the dashboard shows and whether probing runs. Replaced as a whole on
/// every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    pub active: TargetId,
    pub paused: bool,
    pub show_jitter: bool,
    pub show_help: bool,
    /// Sample window applied to every target.
    pub history: usize,
}

/// Mutable session state: read lock-free, written under a mutex.
#[derive(Debug)]
pub struct SessionState {
    view: ArcSwap<ViewState>,
    writer: Mutex<()>,
    interval: watch::Sender<Duration>,
}

impl SessionState {
    pub fn new(history: usize, interval: Duration) -> Self {
        let (interval, _) = watch::channel(interval);
        Self {
            view: ArcSwap::from_pointee(ViewState {
                active: TargetId(0),
                paused: false,
                show_jitter: true,
                show_help: false,
                history,
            }),
            writer: Mutex::new(()),
            interval,
        }
    }

    pub fn view(&self) -> Arc<ViewState> {
        self.view.load_full()
    }

    pub fn is_paused(&self) -> bool {
        self.view.load().paused
    }

    pub fn interval(&self) -> Duration {
        *self.interval.borrow()
    }

    /// Receiver that wakes up whenever the probe interval changes.
    pub fn watch_interval(&self) -> watch::Receiver<Duration> {
        self.interval.subscribe()
    }

    pub fn set_interval(&self, interval: Duration) {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        self.interval.send_replace(interval);
    }

    /// Apply a change to the view and publish the result.
    pub fn update(&self, f: impl FnOnce(&mut ViewState)) -> Arc<ViewState> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = ViewState::clone(&self.view.load());
        f(&mut next);
        let next = Arc::new(next);
        self.view.store(Arc::clone(&next));
        next
    }
}

/// A target together with its sample window and health indicators.
#[derive(Debug)]
pub struct TargetMonitor {
    pub id: TargetId,
    pub target: Target,
    pub store: SampleStore,
    consecutive_failures: AtomicU32,
    unreachable: AtomicBool,
    dispatched: AtomicU64,
    skipped_ticks: AtomicU64,
    complete: AtomicBool,
    port_check: ArcSwapOption<PortCheckReport>,
    port_check_runs: AtomicU64,
}

impl TargetMonitor {
    pub fn new(id: TargetId, target: Target, capacity: usize) -> Self {
        Self {
            id,
            target,
            store: SampleStore::new(capacity),
            consecutive_failures: AtomicU32::new(0),
            unreachable: AtomicBool::new(false),
            dispatched: AtomicU64::new(0),
            skipped_ticks: AtomicU64::new(0),
            complete: AtomicBool::new(false),
            port_check: ArcSwapOption::empty(),
            port_check_runs: AtomicU64::new(0),
        }
    }

    /// Track consecutive hard failures. Timeouts count as plain loss and
    /// neither raise nor clear the indicator; a reply clears it.
    pub fn note_outcome(&self, outcome: &ProbeOutcome) {
        match outcome {
            ProbeOutcome::Reply(_) => {
                self.consecutive_failures.store(0, Ordering::Release);
                if self.unreachable.swap(false, Ordering::AcqRel) {
                    info!(host = %self.target.label, "Target reachable again");
                }
            }
            ProbeOutcome::Timeout => {}
            ProbeOutcome::Unreachable(_) | ProbeOutcome::Error(_) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= UNREACHABLE_THRESHOLD && !self.unreachable.swap(true, Ordering::AcqRel)
                {
                    warn!(
                        host = %self.target.label,
                        failures,
                        "Target marked unreachable"
                    );
                }
            }
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.unreachable.load(Ordering::Acquire)
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Acquire)
    }

    pub(crate) fn note_dispatch(&self) -> u64 {
        self.dispatched.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks.load(Ordering::Acquire)
    }

    pub(crate) fn note_skipped_tick(&self) {
        self.skipped_ticks.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }

    pub(crate) fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    /// Latest port check report, possibly still running.
    pub fn port_check(&self) -> Option<Arc<PortCheckReport>> {
        self.port_check.load_full()
    }

    /// Show a pending report for a new check and return it for the runner.
    pub(crate) fn begin_port_check(&self, kind: PortCheck) -> PortCheckReport {
        let mut report = PortCheckReport::pending(kind, &kind.ports());
        report.generation = self.port_check_runs.fetch_add(1, Ordering::AcqRel) + 1;
        self.port_check.store(Some(Arc::new(report.clone())));
        report
    }

    /// Publish progress of a check unless a newer one has started since.
    pub(crate) fn update_port_check(&self, report: &PortCheckReport) {
        let next = Arc::new(report.clone());
        self.port_check.rcu(|current| match current {
            Some(shown) if shown.generation > report.generation => Some(Arc::clone(shown)),
            _ => Some(Arc::clone(&next)),
        });
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            warn!(error = %e, "Failed to listen for SIGTERM");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

/// The context object shared by the scheduler, the dashboard and the input handler.
pub struct Session {
    targets: Vec<TargetMonitor>,
    prober: Arc<dyn Prober>,
    notices: Arc<NoticeBoard>,
    state: SessionState,
    settings: SessionSettings,
    cancel: CancellationToken,
    started: Instant,
}

impl Session {
    pub fn new(
        targets: Vec<Target>,
        prober: Arc<dyn Prober>,
        notices: Arc<NoticeBoard>,
        settings: SessionSettings,
    ) -> Arc<Self> {
        let targets = targets
            .into_iter()
            .enumerate()
            .map(|(i, target)| TargetMonitor::new(TargetId(i), target, settings.capacity))
            .collect::<Vec<_>>();
        debug!(
            targets = targets.len(),
            interval_ms = settings.interval.as_millis(),
            timeout_ms = settings.timeout.as_millis(),
            capacity = settings.capacity,
            "Session created"
        );

        Arc::new(Self {
            targets,
            prober,
            notices,
            state: SessionState::new(settings.capacity, settings.interval),
            settings,
            cancel: CancellationToken::new(),
            started: Instant::now(),
        })
    }

    pub fn targets(&self) -> &[TargetMonitor] {
        &self.targets
    }

    pub fn target(&self, id: TargetId) -> Option<&TargetMonitor> {
        self.targets.get(id.0)
    }

    pub fn active(&self) -> Option<&TargetMonitor> {
        self.target(self.state.view().active)
    }

    pub fn prober(&self) -> &Arc<dyn Prober> {
        &self.prober
    }

    pub fn method(&self) -> ProbeMethod {
        self.prober.method()
    }

    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Ask every activity to stop.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            info!("Shutdown requested");
        }
        self.cancel.cancel();
    }

    /// Shut the session down on Ctrl+C or SIGTERM.
    pub fn spawn_signal_handler(self: &Arc<Self>) -> JoinHandle<()> {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            let cancel = session.cancel.clone();
            tokio::select! {
                _ = cancel.cancelled() => return,
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        warn!(error = %e, "Failed to listen for Ctrl+C");
                        return;
                    }
                    info!("Interrupt received");
                }
                _ = terminate() => info!("Termination signal received"),
            }
            session.shutdown();
        })
    }

    /// True once every target reached its probe count.
    pub fn is_complete(&self) -> bool {
        self.settings.count.is_some() && self.targets.iter().all(TargetMonitor::is_complete)
    }

    pub fn runtime(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn toggle_pause(&self) -> bool {
        let view = self.state.update(|v| v.paused = !v.paused);
        info!(paused = view.paused, "Probing paused state changed");
        view.paused
    }

    pub fn select_target(&self, index: usize) {
        if index < self.targets.len() {
            self.state.update(|v| v.active = TargetId(index));
            debug!(index, "Active target selected");
        }
    }

    pub fn next_target(&self) {
        let count = self.targets.len().max(1);
        self.state.update(|v| v.active = TargetId((v.active.0 + 1) % count));
    }

    pub fn previous_target(&self) {
        let count = self.targets.len().max(1);
        self.state
            .update(|v| v.active = TargetId((v.active.0 + count - 1) % count));
    }

    pub fn toggle_jitter_panel(&self) {
        self.state.update(|v| v.show_jitter = !v.show_jitter);
    }

    pub fn toggle_help(&self) {
        self.state.update(|v| v.show_help = !v.show_help);
    }

    /// Probe more often: shorten the interval by one step.
    pub fn speed_up(&self) -> Duration {
        let current = self.state.interval();
        match current.checked_sub(INTERVAL_STEP) {
            Some(next) if next >= MIN_INTERVAL => {
                self.state.set_interval(next);
                info!(interval_ms = next.as_millis(), "Probe interval changed");
                next
            }
            _ => current,
        }
    }

    /// Probe less often: lengthen the interval by one step.
    pub fn slow_down(&self) -> Duration {
        let current = self.state.interval();
        let next = current + INTERVAL_STEP;
        if next <= MAX_INTERVAL {
            self.state.set_interval(next);
            info!(interval_ms = next.as_millis(), "Probe interval changed");
            next
        } else {
            current
        }
    }

    /// Widen the window by one step. A window outside the key range is pulled
    /// into it, but never in the opposite direction of the key.
    pub fn grow_history(&self) -> usize {
        self.resize_history(|h| {
            let next = h.saturating_add(HISTORY_STEP).clamp(MIN_HISTORY, MAX_HISTORY);
            (next > h).then_some(next)
        })
    }

    pub fn shrink_history(&self) -> usize {
        self.resize_history(|h| {
            let next = h.saturating_sub(HISTORY_STEP).clamp(MIN_HISTORY, MAX_HISTORY);
            (next < h).then_some(next)
        })
    }

    fn resize_history(&self, step: impl FnOnce(usize) -> Option<usize>) -> usize {
        let current = self.state.view().history;
        let Some(next) = step(current) else {
            return current;
        };
        for monitor in &self.targets {
            if let Err(e) = monitor.store.resize(next) {
                warn!(error = %e, host = %monitor.target.label, "Failed to resize history");
            }
        }
        self.state.update(|v| v.history = next);
        debug!(history = next, "History window changed");
        next
    }

    /// Clear the active target's statistics.
    pub fn reset_active(&self) {
        if let Some(monitor) = self.active() {
            info!(host = %monitor.target.label, "Resetting statistics");
            monitor.store.reset();
        }
    }
}
