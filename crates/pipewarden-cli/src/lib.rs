//! pipewarden CLI - runs one configured command under a supervisor
//!
//! Everything here is caller-side: configuration loading, logging setup and
//! console rendering of the events produced by `pipewarden-process`.

pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod runner;

pub use config::RunConfig;
pub use error::{CliError, CliResult};
