//! Error types shared across the crate

use thiserror::Error;

/// Errors raised by the persisted key-value store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to lock storage: {0}")]
    Lock(String),
}

/// Errors raised by timer operations
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("Failed to lock {0}")]
    Lock(&'static str),

    #[error("Timer view is not mounted")]
    NotMounted,

    #[error("Timer engine stopped responding")]
    EngineGone,

    #[error("Unknown timer mode: {0}")]
    UnknownMode(String),

    #[error("No active timer")]
    Inactive,

    #[error("Timer status widget is hidden")]
    WidgetHidden,
}

/// Errors raised while recording completed sessions
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend rejected session: {0}")]
    Rejected(String),
}

pub type TimerResult<T> = Result<T, TimerError>;
