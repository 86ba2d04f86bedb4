//! Constants used throughout the monitor

use std::time::Duration;

/// Default number of samples kept per target
pub const DEFAULT_CAPACITY: usize = 200;

/// Largest accepted sample window
pub const MAX_CAPACITY: usize = 100_000;

/// Default dashboard frame rate
pub const DEFAULT_FPS: u32 = 20;

/// Highest accepted dashboard frame rate
pub const MAX_FPS: u32 = 60;

/// Default port for TCP-connect probing
pub const DEFAULT_TCP_PORT: u16 = 80;

/// Interval bounds and step for runtime speed adjustments
pub const MIN_INTERVAL: Duration = Duration::from_millis(50);
pub const MAX_INTERVAL: Duration = Duration::from_millis(5000);
pub const INTERVAL_STEP: Duration = Duration::from_millis(50);

/// History window bounds and step for runtime adjustments
pub const MIN_HISTORY: usize = 30;
pub const MAX_HISTORY: usize = 600;
pub const HISTORY_STEP: usize = 10;

/// Number of most recent replies used for the rolling average
pub const RECENT_WINDOW: usize = 10;

/// Consecutive unreachable/error outcomes before a target is flagged unreachable
pub const UNREACHABLE_THRESHOLD: u32 = 5;

/// Histogram lower bound in microseconds
pub const HISTOGRAM_LOW_BOUND_US: u64 = 1;

/// Histogram upper bound in microseconds (one minute)
pub const HISTOGRAM_HIGH_BOUND_US: u64 = 60_000_000;

/// Histogram significant digits for precision
pub const HISTOGRAM_SIGNIFICANT_DIGITS: u8 = 3;

/// Quality grade thresholds on the rolling average, in milliseconds
pub const EXCELLENT_LATENCY_MS: f64 = 30.0;
pub const GOOD_LATENCY_MS: f64 = 100.0;
pub const FAIR_LATENCY_MS: f64 = 200.0;

/// Terminals smaller than this only show the latency graph
pub const COMPACT_MIN_WIDTH: u16 = 50;
pub const COMPACT_MIN_HEIGHT: u16 = 12;

/// Consecutive failed draws tolerated before the dashboard gives up
pub const MAX_CONSECUTIVE_DRAW_FAILURES: u32 = 10;

/// Timeout for each web check connection
pub const WEB_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Ports probed by the web check
pub const WEB_CHECK_PORTS: [u16; 2] = [80, 443];

/// Timeout for each port scan connection
pub const PORT_SCAN_TIMEOUT: Duration = Duration::from_millis(1500);

/// Connections a port check keeps in flight at once
pub const PORT_CHECK_CONCURRENCY: usize = 5;

/// Well-known services probed by the port scan, in scan order
pub const COMMON_PORTS: [(u16, &str); 27] = [
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (53, "dns"),
    (80, "http"),
    (110, "pop3"),
    (111, "rpc"),
    (135, "msrpc"),
    (139, "netbios"),
    (143, "imap"),
    (443, "https"),
    (445, "smb"),
    (993, "imaps"),
    (995, "pop3s"),
    (1433, "mssql"),
    (3306, "mysql"),
    (3389, "rdp"),
    (5432, "postgres"),
    (5900, "vnc"),
    (6379, "redis"),
    (8000, "http-alt"),
    (8080, "http-alt"),
    (8443, "https-alt"),
    (9200, "elastic"),
    (25565, "minecraft"),
    (27017, "mongodb"),
];

/// Progress bar tick interval in milliseconds
pub const PROGRESS_TICK_INTERVAL_MS: u64 = 100;
