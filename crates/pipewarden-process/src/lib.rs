//! # pipewarden-process
//!
//! **Purpose**: Supervision of a single external process
//!
//! Starts a child with an explicit environment, feeds its input, drains
//! stdout and stderr concurrently and watches for its exit, merging all of it
//! into one event sequence that ends only when every source is done.
//!
//! ## Features
//!
//! - **Isolated Environment**: Children start from an empty environment plus an explicit map
//! - **Concurrent Draining**: One task per output stream, so a full pipe never deadlocks
//! - **Completion Watching**: Exit observed on its own task, reported exactly once
//! - **Unified Events**: Blocking selection over all live sources, no polling
//! - **Termination**: Timeout and cancellation with SIGTERM→SIGKILL escalation on the process group
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pipewarden_process::{Event, ProcessConfig, Supervisor};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProcessConfig::new("/bin/sh")
//!     .args(["-c", "cat"])
//!     .env("MYKEY", "MYVALUE");
//!
//! let mut supervisor = Supervisor::start(config)?;
//! supervisor.write_input(b"a\nb\nc\n").await?;
//! supervisor.close_input().await?;
//!
//! while let Some(event) = supervisor.next_event().await {
//!     match event {
//!         Event::Output { source, data } => println!("{}: {:?}", source, data),
//!         Event::StreamError { source, error } => eprintln!("{}: {}", source, error),
//!         Event::Exited(outcome) => println!("process {}", outcome),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod drainer;
pub mod error;
pub mod event;
pub mod supervisor;
mod watcher;

pub use config::ProcessConfig;
pub use drainer::{DrainReport, Drainer};
pub use error::{ProcessError, Result};
pub use event::{Event, ExitOutcome, Output, StreamSource, SupervisorState};
pub use supervisor::Supervisor;
