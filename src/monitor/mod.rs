//! Probe scheduling, sample storage and session state for RustyPing

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod model;
pub mod portcheck;
pub mod scheduler;
pub mod session;
pub mod sink;
pub mod statistics;
pub mod store;

pub use config::Config;
pub use constants::*;
pub use error::{PingError, Result};
pub use logging::{init_logging, LogTarget};
pub use model::{FailureKind, ProbeOutcome, Sample, SequenceNumber, Target, TargetId};
pub use portcheck::{spawn_port_check, PortCheck, PortCheckReport, PortStatus};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use session::{NoticeBoard, Session, SessionSettings, SessionState, TargetMonitor, ViewState};
pub use sink::{spawn_sinks, CsvLog, SampleEvent, SampleSink};
pub use statistics::{Quality, Statistics};
pub use store::{SampleStore, Samples, Snapshot};
