//! Process configuration

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ProcessError, Result};

/// Default bytes requested per stream read
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8192;

/// SIGTERM to SIGKILL escalation delay
pub const DEFAULT_KILL_GRACE: Duration = Duration::from_millis(200);

/// Configuration for starting a supervised process
///
/// The child never inherits the caller's environment implicitly: it starts
/// from an empty environment and receives `env`, plus any variable named in
/// `inherit` that is set in the calling process.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    /// Executable command
    pub command: String,
    /// Command arguments
    pub args: Vec<String>,
    /// Working directory (None = current dir)
    pub working_dir: Option<PathBuf>,
    /// Complete child environment
    pub env: HashMap<String, String>,
    /// Names of caller variables passed through when present
    pub inherit: Vec<String>,
    /// Terminate the process if it runs longer than this (None = no timeout)
    pub timeout: Option<Duration>,
    /// Delay between SIGTERM and SIGKILL when terminating
    pub kill_grace: Duration,
    /// Maximum bytes per stream read
    pub read_buffer_size: usize,
    /// Pipe stdin (otherwise attached to the null device)
    pub pipe_stdin: bool,
    /// Capture stdout
    pub capture_stdout: bool,
    /// Capture stderr
    pub capture_stderr: bool,
}

impl ProcessConfig {
    /// Create new process configuration
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: vec![],
            working_dir: None,
            env: HashMap::new(),
            inherit: vec![],
            timeout: None,
            kill_grace: DEFAULT_KILL_GRACE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            pipe_stdin: true,
            capture_stdout: true,
            capture_stderr: true,
        }
    }

    /// Set command arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add several environment variables
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Pass a variable through from the calling process, if it is set there
    pub fn inherit(mut self, key: impl Into<String>) -> Self {
        self.inherit.push(key.into());
        self
    }

    /// Set timeout duration
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Set the SIGTERM to SIGKILL escalation delay
    pub fn kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    /// Set the maximum bytes per stream read
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Enable/disable the stdin pipe
    pub fn pipe_stdin(mut self, pipe: bool) -> Self {
        self.pipe_stdin = pipe;
        self
    }

    /// Enable/disable stdout capture
    pub fn capture_stdout(mut self, capture: bool) -> Self {
        self.capture_stdout = capture;
        self
    }

    /// Enable/disable stderr capture
    pub fn capture_stderr(mut self, capture: bool) -> Self {
        self.capture_stderr = capture;
        self
    }

    /// Check the configuration before anything is launched
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            return Err(ProcessError::InvalidConfig(
                "command must not be empty".to_string(),
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(ProcessError::InvalidConfig(
                "read buffer size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the environment the child starts with
    pub fn child_env(&self) -> HashMap<String, String> {
        let mut env: HashMap<String, String> = self
            .inherit
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.clone(), value)))
            .collect();
        env.extend(self.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env
    }
}
