//! Live terminal dashboard
//!
//! The render loop redraws at a fixed frame rate from the latest snapshots
//! and applies keyboard input to the session. It never waits on the network.

pub mod input;
pub mod render;
pub mod theme;

pub use input::{apply, map_key, Action, Control};
pub use render::{draw, FrameData};
pub use theme::Theme;

use crate::monitor::constants::MAX_CONSECUTIVE_DRAW_FAILURES;
use crate::monitor::error::{PingError, Result};
use crate::monitor::session::Session;
use crate::monitor::statistics::Statistics;
use crate::monitor::store::Snapshot;
use crossterm::cursor::{Hide, Show};
use crossterm::event::{Event, EventStream};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, stdout, Stdout};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

fn terminal_error(e: io::Error) -> PingError {
    PingError::Terminal(e.to_string())
}

fn restore_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen, Show)
}

/// Restore the terminal before the default panic message is printed.
fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = restore_terminal();
            previous(info);
        }));
    });
}

/// Raw mode plus alternate screen for as long as the guard lives.
pub struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    pub fn enter() -> Result<Self> {
        enable_raw_mode().map_err(terminal_error)?;
        if let Err(e) = execute!(stdout(), EnterAlternateScreen, Hide) {
            let _ = disable_raw_mode();
            return Err(terminal_error(e));
        }
        install_panic_hook();

        let terminal = Terminal::new(CrosstermBackend::new(stdout())).map_err(|e| {
            let _ = restore_terminal();
            terminal_error(e)
        })?;
        debug!("Terminal switched to dashboard mode");
        Ok(Self { terminal })
    }

    pub fn terminal(&mut self) -> &mut Terminal<CrosstermBackend<Stdout>> {
        &mut self.terminal
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        match restore_terminal() {
            Ok(()) => debug!("Terminal restored"),
            Err(e) => error!(error = %e, "Failed to restore terminal"),
        }
    }
}

/// Snapshots last shown per target, with their statistics. A frame never goes
/// back to an older snapshot than one already on screen.
pub struct SnapshotCache {
    shown: Vec<Arc<Snapshot>>,
    stats: Vec<Option<Statistics>>,
}

impl SnapshotCache {
    pub fn new(session: &Session) -> Self {
        let shown: Vec<Arc<Snapshot>> =
            session.targets().iter().map(|t| t.store.snapshot()).collect();
        let stats = shown.iter().map(|s| s.stats().ok()).collect();
        Self { shown, stats }
    }

    /// Load the newest snapshot of every target. Statistics are recomputed
    /// only for targets whose snapshot changed.
    pub fn refresh(&mut self, session: &Session) -> &[Arc<Snapshot>] {
        let entries = self.shown.iter_mut().zip(self.stats.iter_mut());
        for ((shown, stats), monitor) in entries.zip(session.targets()) {
            let latest = monitor.store.snapshot();
            if latest.version() > shown.version() {
                *stats = latest.stats().ok();
                *shown = latest;
            }
        }
        &self.shown
    }

    pub fn snapshots(&self) -> &[Arc<Snapshot>] {
        &self.shown
    }

    /// Statistics of each shown snapshot, indexed like the targets.
    pub fn stats(&self) -> &[Option<Statistics>] {
        &self.stats
    }
}

/// The interactive dashboard.
pub struct Dashboard {
    session: Arc<Session>,
    theme: Theme,
    frame_interval: Duration,
    cache: SnapshotCache,
}

impl Dashboard {
    pub fn new(session: Arc<Session>, theme: Theme, frame_interval: Duration) -> Self {
        let cache = SnapshotCache::new(&session);
        Self {
            session,
            theme,
            frame_interval,
            cache,
        }
    }

    /// Run until the user quits or the session shuts down. The terminal is
    /// restored on every return path.
    pub async fn run(mut self) -> Result<()> {
        let mut guard = TerminalGuard::enter()?;
        let mut events = EventStream::new();
        let mut frames = tokio::time::interval(self.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let cancel = self.session.cancel_token().clone();
        let mut failures = 0u32;

        info!(
            fps_interval_ms = self.frame_interval.as_millis(),
            theme = self.theme.name,
            "Dashboard started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = frames.tick() => {
                    match self.draw_frame(guard.terminal()) {
                        Ok(()) => failures = 0,
                        Err(e) => {
                            failures += 1;
                            warn!(error = %e, failures, "Frame skipped");
                            if failures >= MAX_CONSECUTIVE_DRAW_FAILURES {
                                self.session.shutdown();
                                return Err(PingError::Terminal(format!(
                                    "{} consecutive draw failures, last: {}",
                                    failures, e
                                )));
                            }
                        }
                    }
                }
                event = events.next() => match event {
                    Some(Ok(Event::Key(key))) => {
                        let help_open = self.session.state().view().show_help;
                        if let Some(action) = map_key(key, help_open) {
                            if apply(&self.session, action) == Control::Quit {
                                break;
                            }
                        }
                    }
                    Some(Ok(Event::Resize(width, height))) => {
                        debug!(width, height, "Terminal resized");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => warn!(error = %e, "Failed to read terminal event"),
                    None => {
                        warn!("Terminal event stream closed");
                        self.session.shutdown();
                        break;
                    }
                }
            }
        }

        info!("Dashboard stopped");
        drop(guard);
        Ok(())
    }

    fn draw_frame(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
        let view = self.session.state().view();
        let notice = self.session.notices().current();
        self.cache.refresh(&self.session);
        let data = FrameData {
            session: &self.session,
            view: &view,
            snapshots: self.cache.snapshots(),
            stats: self.cache.stats(),
            theme: &self.theme,
            notice: notice.as_deref().map(String::as_str),
        };
        terminal.draw(|f| draw(f, &data))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::model::{ProbeOutcome, Sample, SequenceNumber, Target};
    use crate::monitor::session::{NoticeBoard, SessionSettings};
    use crate::probe::MockProber;
    use std::net::{IpAddr, Ipv4Addr};

    fn session() -> Arc<Session> {
        Session::new(
            vec![Target::new("127.0.0.1", IpAddr::V4(Ipv4Addr::LOCALHOST))],
            Arc::new(MockProber::new()),
            Arc::new(NoticeBoard::new()),
            SessionSettings {
                interval: Duration::from_secs(1),
                timeout: Duration::from_secs(1),
                capacity: 10,
                count: None,
            },
        )
    }

    #[test]
    fn test_snapshot_cache_follows_store() -> Result<()> {
        let session = session();
        let mut cache = SnapshotCache::new(&session);
        assert!(cache.refresh(&session)[0].is_empty());

        session.targets()[0].store.record(Sample::new(
            SequenceNumber(1),
            ProbeOutcome::Reply(Duration::from_millis(4)),
        ))?;
        assert_eq!(cache.refresh(&session)[0].len(), 1);

        // a reset is a newer snapshot even though it holds fewer samples
        session.reset_active();
        assert!(cache.refresh(&session)[0].is_empty());
        Ok(())
    }

    #[test]
    fn test_snapshot_cache_never_goes_back() -> Result<()> {
        let session = session();
        let store = &session.targets()[0].store;
        store.record(Sample::new(SequenceNumber(1), ProbeOutcome::Timeout))?;
        let mut cache = SnapshotCache::new(&session);
        let shown_version = cache.refresh(&session)[0].version();

        store.record(Sample::new(SequenceNumber(2), ProbeOutcome::Timeout))?;
        let versions: Vec<u64> = (0..3).map(|_| cache.refresh(&session)[0].version()).collect();
        assert!(versions.iter().all(|v| *v > shown_version));
        assert!(versions.windows(2).all(|w| w[0] <= w[1]));
        Ok(())
    }

    #[test]
    fn test_snapshot_cache_keeps_stats_in_step() -> Result<()> {
        let session = session();
        let mut cache = SnapshotCache::new(&session);
        assert_eq!(cache.stats().len(), 1);
        assert_eq!(cache.stats()[0].as_ref().map(Statistics::total), Some(0));

        let store = &session.targets()[0].store;
        store.record(Sample::new(SequenceNumber(1), ProbeOutcome::Reply(Duration::from_millis(4))))?;
        store.record(Sample::new(SequenceNumber(2), ProbeOutcome::Timeout))?;
        cache.refresh(&session);
        let stats = cache.stats()[0].as_ref().expect("stats for a non-empty window");
        assert_eq!(stats.total(), 2);
        assert_eq!(stats.count(), 1);
        assert_eq!(cache.snapshots()[0].len(), 2);
        Ok(())
    }
}
