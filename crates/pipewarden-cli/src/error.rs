use pipewarden_process::ProcessError;
use thiserror::Error;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CliError::Config(msg) => format!(
                "Configuration error: {}\n\nCheck pipewarden.toml or the PIPEWARDEN_* environment variables.",
                msg
            ),
            CliError::Process(e) if e.is_start_error() => {
                format!("Could not start process: {}", e)
            }
            CliError::Process(e) => format!("Process supervision failed: {}", e),
            CliError::Io(e) => format!("Console output failed: {}", e),
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
