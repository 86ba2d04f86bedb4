//! Plain-output mode for pipes, scripts and `--no-tui`.
//!
//! Every completed probe becomes one line on stdout and a summary per target
//! is printed when the run ends.

pub mod progress;
pub mod reporter;

pub use progress::ProgressTracker;
pub use reporter::Reporter;

use crate::monitor::error::Result;
use crate::monitor::scheduler::Scheduler;
use crate::monitor::session::Session;
use crate::monitor::sink::{spawn_sinks, CsvLog, SampleEvent, SampleSink};
use colored::*;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Prints one line per sample, and any new notice before it.
pub struct LinePrinter {
    session: Arc<Session>,
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
    progress: Option<ProgressTracker>,
    seen_notices: usize,
}

impl LinePrinter {
    pub fn new(session: Arc<Session>, progress: Option<ProgressTracker>) -> Self {
        Self::with_writers(session, progress, Box::new(io::stdout()), Box::new(io::stderr()))
    }

    pub fn with_writers(
        session: Arc<Session>,
        progress: Option<ProgressTracker>,
        out: Box<dyn Write + Send>,
        err: Box<dyn Write + Send>,
    ) -> Self {
        // notices posted before the run started were already printed
        let seen_notices = session.notices().posted();
        Self {
            session,
            out,
            err,
            progress,
            seen_notices,
        }
    }

    fn format_line(event: &SampleEvent) -> String {
        let sample = &event.sample;
        match sample.latency_ms() {
            Some(ms) => format!(
                "[{}] seq={} time={:.2} ms",
                event.address, sample.sequence, ms
            ),
            None => format!(
                "[{}] seq={} {}",
                event.address,
                sample.sequence,
                sample.outcome.status().red()
            ),
        }
    }
}

impl SampleSink for LinePrinter {
    fn accept(&mut self, event: &SampleEvent) -> Result<()> {
        if let Some(notice) = self.session.notices().take_new(&mut self.seen_notices) {
            let line = format!("{}", notice.as_str().yellow());
            match &self.progress {
                Some(progress) => progress.println(line),
                None => writeln!(self.err, "{}", line)?,
            }
        }

        let line = Self::format_line(event);
        match &mut self.progress {
            Some(progress) => {
                progress.println(line);
                progress.update(event.sample.latency_ms());
            }
            None => writeln!(self.out, "{}", line)?,
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(progress) = &self.progress {
            progress.finish();
        }
        self.out.flush()?;
        Ok(())
    }
}

/// Probes expected over the whole run; saturates for absurdly large counts.
fn progress_total(count: u64, targets: usize) -> u64 {
    count.saturating_mul(targets as u64)
}

/// Probe until the count is reached or the process is interrupted, then print
/// the summary of every target.
pub async fn run_headless(session: Arc<Session>, csv: Option<CsvLog>) -> Result<()> {
    let progress = match session.settings().count {
        Some(count) if io::stderr().is_terminal() => {
            Some(ProgressTracker::new(progress_total(count, session.targets().len()))?)
        }
        _ => None,
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let mut sinks: Vec<Box<dyn SampleSink>> =
        vec![Box::new(LinePrinter::new(Arc::clone(&session), progress))];
    if let Some(csv) = csv {
        sinks.push(Box::new(csv));
    }
    let sink_task = spawn_sinks(rx, sinks);
    let signals = session.spawn_signal_handler();

    info!(
        targets = session.targets().len(),
        method = %session.method(),
        count = ?session.settings().count,
        "Headless run started"
    );
    Scheduler::new(Arc::clone(&session))
        .with_sink(tx)
        .spawn()
        .join()
        .await;
    session.shutdown();

    if let Err(e) = signals.await {
        warn!(error = %e, "Signal handler ended abnormally");
    }
    if let Err(e) = sink_task.await {
        warn!(error = %e, "Sample output ended abnormally");
    }
    debug!("Sample output drained");

    let elapsed = session.runtime();
    for monitor in session.targets() {
        Reporter.print_results(monitor, &monitor.store.snapshot(), session.method(), elapsed)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::model::{ProbeOutcome, Sample, SequenceNumber, Target, TargetId};
    use crate::monitor::session::{NoticeBoard, SessionSettings};
    use crate::probe::{MockProber, ProbeMethod};
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn session(prober: MockProber, notices: Arc<NoticeBoard>, count: Option<u64>) -> Arc<Session> {
        Session::new(
            vec![Target::new("127.0.0.1", IpAddr::V4(Ipv4Addr::LOCALHOST))],
            Arc::new(prober),
            notices,
            SessionSettings {
                interval: Duration::from_millis(20),
                timeout: Duration::from_millis(200),
                capacity: 50,
                count,
            },
        )
    }

    fn event(seq: u64, outcome: ProbeOutcome) -> SampleEvent {
        SampleEvent {
            target: TargetId(0),
            address: "127.0.0.1".to_string(),
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            sample: Sample::new(SequenceNumber(seq), outcome),
        }
    }

    #[test]
    fn test_line_printer_formats_samples() -> Result<()> {
        colored::control::set_override(false);
        let (out, err) = (SharedBuf::default(), SharedBuf::default());
        let session = session(MockProber::new(), Arc::new(NoticeBoard::new()), None);
        let mut printer =
            LinePrinter::with_writers(session, None, Box::new(out.clone()), Box::new(err.clone()));

        printer.accept(&event(1, ProbeOutcome::Reply(Duration::from_micros(12_346))))?;
        printer.accept(&event(2, ProbeOutcome::Timeout))?;
        printer.finish()?;

        assert_eq!(
            out.contents(),
            "[127.0.0.1] seq=1 time=12.35 ms\n[127.0.0.1] seq=2 timeout\n"
        );
        assert!(err.contents().is_empty());
        Ok(())
    }

    #[test]
    fn test_line_printer_shows_each_notice_once() -> Result<()> {
        colored::control::set_override(false);
        let (out, err) = (SharedBuf::default(), SharedBuf::default());
        let notices = Arc::new(NoticeBoard::new());
        notices.post("printed at startup");
        let session = session(MockProber::new(), Arc::clone(&notices), None);
        let mut printer =
            LinePrinter::with_writers(session, None, Box::new(out), Box::new(err.clone()));

        printer.accept(&event(1, ProbeOutcome::Timeout))?;
        assert!(err.contents().is_empty());

        notices.post("ICMP unavailable, using tcp/80");
        printer.accept(&event(2, ProbeOutcome::Timeout))?;
        printer.accept(&event(3, ProbeOutcome::Timeout))?;
        assert_eq!(err.contents(), "ICMP unavailable, using tcp/80\n");
        Ok(())
    }

    #[test]
    fn test_progress_total_saturates() {
        assert_eq!(progress_total(10, 3), 30);
        assert_eq!(progress_total(u64::MAX, 2), u64::MAX);
        assert_eq!(progress_total(u64::MAX / 2 + 1, 2), u64::MAX);
    }

    #[tokio::test]
    async fn test_run_headless_writes_csv() -> Result<()> {
        let mut prober = MockProber::new();
        prober.expect_method().returning(|| ProbeMethod::Tcp { port: 80 });
        prober
            .expect_probe()
            .times(3)
            .returning(|_, _, _| Box::pin(async { Ok(ProbeOutcome::Reply(Duration::from_millis(3))) }));
        let session = session(prober, Arc::new(NoticeBoard::new()), Some(3));

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("samples.csv");
        run_headless(Arc::clone(&session), Some(CsvLog::open(&path)?)).await?;

        let csv = std::fs::read_to_string(&path)?;
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[1].ends_with(",127.0.0.1,127.0.0.1,1,3.000,reply"));
        assert!(session.is_complete());
        assert!(session.is_shutting_down());
        Ok(())
    }
}
