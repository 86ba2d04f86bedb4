use crate::monitor::error::{PingError, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Where log records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Append to a file.
    File(PathBuf),
    /// Drop everything; used while the dashboard owns the terminal.
    Discard,
}

/// Initialize structured logging with configurable log levels
///
/// `level` is used unless the `RUST_LOG` environment variable is set.
/// Examples:
/// - `RUST_LOG=debug` - Debug level and above
/// - `RUST_LOG=rustyping=trace` - Trace level for rustyping only
pub fn init_logging(level: &str, json: bool, target: LogTarget) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| PingError::Config(format!("invalid log level '{}': {}", level, e)))?;

    let ansi = target == LogTarget::Stderr;
    let writer = match &target {
        LogTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogTarget::Discard => BoxMakeWriter::new(std::io::sink),
        LogTarget::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
    };

    let layer: Box<dyn Layer<Registry> + Send + Sync> = if json {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer()
            .with_ansi(ansi)
            .with_target(false)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_file(true)
            .with_writer(writer)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| PingError::Config(format!("failed to install logger: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::warn;

    #[test]
    fn test_file_logging() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("rustyping.log");
        init_logging("info", false, LogTarget::File(path.clone()))?;

        warn!(target_count = 2, "Logging to file");
        let contents = std::fs::read_to_string(&path)?;
        assert!(contents.contains("Logging to file"));
        assert!(contents.contains("target_count=2"));
        Ok(())
    }
}
