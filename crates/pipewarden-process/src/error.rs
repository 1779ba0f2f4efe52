//! Error types for process supervision

use std::io;
use thiserror::Error;

use crate::event::StreamSource;

/// Process supervision errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Executable could not be located or launched
    #[error("Failed to spawn process `{command}`: {error}")]
    SpawnFailed {
        command: String,
        #[source]
        error: io::Error,
    },

    /// Invalid configuration, rejected before anything is launched
    #[error("Invalid process configuration: {0}")]
    InvalidConfig(String),

    /// Reading an output stream failed with something other than end-of-stream
    #[error("Failed to read {stream} of process: {error}")]
    ReadFailed {
        stream: StreamSource,
        #[source]
        error: io::Error,
    },

    /// Waiting for the process to exit failed
    #[error("Failed to wait for process: {0}")]
    WaitFailed(#[source] io::Error),

    /// Writing to the process input failed
    #[error("Failed to write process input: {0}")]
    WriteFailed(#[source] io::Error),

    /// Closing the process input failed
    #[error("Failed to close process input: {0}")]
    CloseFailed(#[source] io::Error),

    /// Input was already closed or handed to an input writer
    #[error("Process input is closed")]
    InputClosed,

    /// Process outlived its configured timeout and was terminated
    #[error("Process timed out after {millis}ms")]
    Timeout { millis: u64 },

    /// Failed to kill process
    #[error("Failed to kill process: {0}")]
    KillFailed(String),

    /// The completion watcher ended without reporting an outcome
    #[error("Completion watcher exited without reporting")]
    WatcherLost,
}

impl ProcessError {
    /// Whether this error prevented the process from being started at all
    pub fn is_start_error(&self) -> bool {
        matches!(self, Self::SpawnFailed { .. } | Self::InvalidConfig(_))
    }
}

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;
