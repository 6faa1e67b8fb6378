use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeyflowError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Keyboard controller error: {0}")]
    Enigo(String),
    #[error("Keyboard hook error: {0}")]
    Hook(String),
    #[error("Clipboard error: {0}")]
    Clipboard(String),
    #[error("Invalid trigger: {0}")]
    InvalidTrigger(String),
    #[error("Trigger '{0}' already exists")]
    TriggerExists(String),
    #[error("Trigger '{0}' not found")]
    TriggerNotFound(String),
    #[error("Daemon already running with PID {0}")]
    DaemonAlreadyRunning(u32),
    #[error("Daemon is not running")]
    DaemonNotRunning,
    #[error("Invalid PID in daemon file")]
    InvalidPid,
    #[error("Error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, KeyflowError>;
