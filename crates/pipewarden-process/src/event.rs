//! Events surfaced by a supervised process

use std::fmt;
use std::process::ExitStatus;
use std::sync::Arc;

use crate::error::ProcessError;

/// Output stream a chunk was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamSource {
    /// Standard output
    Stdout,
    /// Standard error
    Stderr,
}

impl StreamSource {
    /// Stream name as used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final outcome of a supervised process
#[derive(Debug, Clone)]
pub enum ExitOutcome {
    /// Exited with status zero
    Success,
    /// Exited with a non-zero code or was killed by a signal
    Failure {
        /// Exit code (None when terminated by a signal)
        code: Option<i32>,
        /// Terminating signal (unix only)
        signal: Option<i32>,
    },
    /// The supervisor could not observe a normal exit
    Error(Arc<ProcessError>),
}

impl ExitOutcome {
    /// Check if the process exited successfully
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Exit code, if the process exited on its own
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Success => Some(0),
            Self::Failure { code, .. } => *code,
            Self::Error(_) => None,
        }
    }

    /// Error cause, if the supervisor failed
    pub fn error(&self) -> Option<&ProcessError> {
        match self {
            Self::Error(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<ExitStatus> for ExitOutcome {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            return Self::Success;
        }

        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self::Failure {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("succeeded"),
            Self::Failure {
                code: Some(code), ..
            } => write!(f, "failed with exit code {}", code),
            Self::Failure {
                signal: Some(signal),
                ..
            } => write!(f, "killed by signal {}", signal),
            Self::Failure { .. } => f.write_str("failed"),
            Self::Error(e) => write!(f, "supervisor error: {}", e),
        }
    }
}

/// One unit of observable output from a supervisor
#[derive(Debug)]
pub enum Event {
    /// Bytes read from an output stream, in read order for that stream
    Output {
        /// Stream the bytes came from
        source: StreamSource,
        /// Bytes read
        data: Vec<u8>,
    },
    /// Reading a stream failed; that stream is closed afterwards
    StreamError {
        /// Stream that failed
        source: StreamSource,
        /// Read failure
        error: ProcessError,
    },
    /// The process terminated; delivered exactly once
    Exited(ExitOutcome),
}

impl Event {
    /// Check if this is an output event
    pub fn is_output(&self) -> bool {
        matches!(self, Self::Output { .. })
    }

    /// Check if this is the completion event
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited(_))
    }

    /// Stream this event belongs to, if any
    pub fn source(&self) -> Option<StreamSource> {
        match self {
            Self::Output { source, .. } | Self::StreamError { source, .. } => Some(*source),
            Self::Exited(_) => None,
        }
    }
}

/// Buffered result of running a process to completion
#[derive(Debug)]
pub struct Output {
    /// Concatenated stdout chunks
    pub stdout: Vec<u8>,
    /// Concatenated stderr chunks
    pub stderr: Vec<u8>,
    /// Read failures observed while draining
    pub stream_errors: Vec<ProcessError>,
    /// Completion outcome
    pub outcome: ExitOutcome,
}

/// Supervisor lifecycle
///
/// An unstarted [`ProcessConfig`](crate::ProcessConfig) is the created state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Process launched, no source has finished yet
    Started,
    /// At least one source finished, at least one still live
    Draining,
    /// Stdout closed, stderr closed, completion delivered and every worker joined
    Terminated,
}
