//! Command line configuration.

use crate::monitor::constants::*;
use crate::monitor::error::{PingError, Result};
use crate::probe::ProbeMode;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(Parser, Debug, Clone)]
#[command(name = "rustyping")]
#[command(about = "Live ICMP/TCP latency monitor for the terminal")]
pub struct Config {
    /// Hosts or IP addresses to probe
    #[arg(required = true, value_name = "HOST")]
    pub targets: Vec<String>,

    /// Time between probes (e.g. 500ms, 1s, 1.5s)
    #[arg(short, long, default_value = "1s", value_parser = parse_duration)]
    pub interval: Duration,

    /// How long to wait for a reply
    #[arg(short = 'W', long, default_value = "1s", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Stop after this many probes per target
    #[arg(short, long)]
    pub count: Option<u64>,

    /// Probe method
    #[arg(long, value_enum, default_value_t = ProbeMode::Auto)]
    pub mode: ProbeMode,

    /// Port used for TCP-connect probing
    #[arg(long, default_value_t = DEFAULT_TCP_PORT)]
    pub port: u16,

    /// Samples kept per target
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Dashboard frames per second
    #[arg(long, default_value_t = DEFAULT_FPS)]
    pub fps: u32,

    /// Use a monochrome theme
    #[arg(long)]
    pub monotone: bool,

    /// Print one line per sample instead of the dashboard
    #[arg(long)]
    pub no_tui: bool,

    /// Append every sample to this CSV file
    #[arg(long, value_name = "FILE")]
    pub csv: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log format (text or json)
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub log_format: String,

    /// Write logs to this file
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

/// Parse `500ms`, `1s`, `1.5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> std::result::Result<Duration, String> {
    let input = input.trim();
    let (number, scale) = if let Some(ms) = input.strip_suffix("ms") {
        (ms, 0.001)
    } else if let Some(s) = input.strip_suffix('s') {
        (s, 1.0)
    } else {
        (input, 1.0)
    };

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration '{}'", input))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("invalid duration '{}'", input));
    }
    Duration::try_from_secs_f64(value * scale).map_err(|e| format!("invalid duration '{}': {}", input, e))
}

impl Config {
    /// Returns the dashboard frame period
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.max(1)
    }

    /// Returns true if JSON format logging is enabled
    pub fn is_json_format(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");

        if self.targets.is_empty() {
            return Err(PingError::Config("at least one target is required".into()));
        }
        if self.targets.iter().any(|t| t.trim().is_empty()) {
            return Err(PingError::Config("target must not be empty".into()));
        }
        if self.interval < MIN_INTERVAL || self.interval > MAX_INTERVAL {
            return Err(PingError::Config(format!(
                "interval must be between {}ms and {}ms",
                MIN_INTERVAL.as_millis(),
                MAX_INTERVAL.as_millis()
            )));
        }
        if self.timeout.is_zero() {
            return Err(PingError::Config("timeout must be > 0".into()));
        }
        if self.count == Some(0) {
            return Err(PingError::Config("count must be > 0".into()));
        }
        if self.capacity == 0 || self.capacity > MAX_CAPACITY {
            return Err(PingError::Config(format!(
                "capacity must be between 1 and {}",
                MAX_CAPACITY
            )));
        }
        if self.fps == 0 || self.fps > MAX_FPS {
            return Err(PingError::Config(format!("fps must be between 1 and {}", MAX_FPS)));
        }
        if self.port == 0 {
            return Err(PingError::Config("port must be > 0".into()));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(PingError::Config(format!(
                "log_level must be one of: {}",
                valid_levels.join(", ")
            )));
        }

        debug!("Configuration validated successfully");
        Ok(())
    }
}
