use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("no echo within {0} us")]
    EchoTimeout(u32),
    #[error("sensor did not respond")]
    Timeout,
    #[error("checksum mismatch")]
    Checksum,
    #[error("reading is not a number")]
    NotANumber,
    #[error("bus error: {0}")]
    Bus(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },
    #[error("subscribe to {filter} failed: {reason}")]
    Subscribe { filter: String, reason: String },
}
