//! Error types for strategy construction and scheduling.

use thiserror::Error;

/// Main error type for pipeline operations.
///
/// Raised while building strategies or starting schedulers. Once a strategy
/// is attached, message delivery never produces an error.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Milliseconds must be a finite, non-negative number (got {0})")]
    InvalidMilliseconds(String),

    #[error("maxCalls must be a number greater than zero (got {0})")]
    InvalidMaxCalls(String),

    #[error("Invalid strategy spec: {0}")]
    InvalidSpec(String),

    #[error("Scheduler is shut down")]
    SchedulerClosed,
}

impl From<serde_json::Error> for StrategyError {
    fn from(e: serde_json::Error) -> Self {
        StrategyError::InvalidSpec(e.to_string())
    }
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, StrategyError>;
