use thiserror::Error;

#[derive(Debug, Error)]
pub enum PingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot resolve {host}: {reason}")]
    Resolve { host: String, reason: String },

    #[error("Probe setup error: {0}")]
    Probe(String),

    #[error("Terminal error: {0}")]
    Terminal(String),

    #[error("Out-of-order sample: sequence {got} is not after {last}")]
    StaleSequence { last: u64, got: u64 },

    #[error("Statistics error: {0}")]
    Statistics(String),
}

pub type Result<T> = std::result::Result<T, PingError>;
