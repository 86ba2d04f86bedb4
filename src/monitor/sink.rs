//! Consumers of completed samples: the CSV log and the headless printer.

use crate::monitor::error::Result;
use crate::monitor::model::{Sample, TargetId};
use chrono::{DateTime, SecondsFormat, Utc};
use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// CSV header line
pub const CSV_HEADER: &str = "timestamp,target,ip,seq,latency_ms,status";

/// A recorded sample together with the target it belongs to.
#[derive(Debug, Clone)]
pub struct SampleEvent {
    pub target: TargetId,
    pub address: String,
    pub ip: IpAddr,
    pub sample: Sample,
}

/// Receives every completed sample, in completion order.
pub trait SampleSink: Send {
    fn accept(&mut self, event: &SampleEvent) -> Result<()>;

    /// Called once after the last event.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Appends samples to a CSV file, one line per sample.
pub struct CsvLog {
    path: PathBuf,
    writer: LineWriter<File>,
    rows: u64,
}

impl CsvLog {
    /// Open `path` for appending, writing the header if the file is empty.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let is_empty = file.metadata()?.len() == 0;
        let mut writer = LineWriter::new(file);
        if is_empty {
            writeln!(writer, "{}", CSV_HEADER)?;
        }
        info!(path = %path.display(), new_file = is_empty, "CSV log opened");
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            rows: 0,
        })
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }
}

/// Quote a field per RFC 4180 when it holds a separator, a quote or a line break.
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

/// Format one CSV row (without the newline).
pub fn csv_row(event: &SampleEvent) -> String {
    let timestamp: DateTime<Utc> = event.sample.wall_time.into();
    let latency = event
        .sample
        .latency_ms()
        .map(|ms| format!("{:.3}", ms))
        .unwrap_or_default();
    format!(
        "{},{},{},{},{},{}",
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        csv_field(&event.address),
        event.ip,
        event.sample.sequence,
        latency,
        event.sample.outcome.status()
    )
}

impl SampleSink for CsvLog {
    fn accept(&mut self, event: &SampleEvent) -> Result<()> {
        writeln!(self.writer, "{}", csv_row(event))?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        debug!(path = %self.path.display(), rows = self.rows, "CSV log closed");
        Ok(())
    }
}

/// Feed every event from `rx` to each sink on a blocking thread.
///
/// A sink that fails is dropped after logging; the others keep running. The
/// task ends when every sender is gone.
pub fn spawn_sinks(
    mut rx: mpsc::UnboundedReceiver<SampleEvent>,
    mut sinks: Vec<Box<dyn SampleSink>>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while let Some(event) = rx.blocking_recv() {
            sinks.retain_mut(|sink| match sink.accept(&event) {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "Sample sink failed; disabling it");
                    false
                }
            });
        }
        for sink in &mut sinks {
            if let Err(e) = sink.finish() {
                warn!(error = %e, "Failed to finish sample sink");
            }
        }
    })
}
