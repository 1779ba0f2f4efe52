//! Drives one supervisor and renders its events

use std::io::Write;

use pipewarden_process::{Event, ExitOutcome, ProcessError, StreamSource, Supervisor};
use tracing::{debug, warn};

use crate::{
    config::RunConfig,
    error::CliResult,
    output::{OutputStyle, Utf8Chunks},
};

/// Run the configured command, copying stdout to `out` and stderr to `err`
pub async fn run<O, E>(
    config: &RunConfig,
    style: &OutputStyle,
    out: &mut O,
    err: &mut E,
) -> CliResult<ExitOutcome>
where
    O: Write,
    E: Write,
{
    let mut supervisor = Supervisor::start(config.process_config())?;
    debug!(pid = supervisor.pid(), command = supervisor.command(), "Supervisor started");

    if let Some(ref input) = config.input {
        // A child that exits without reading its input is not an error for the run
        if let Err(e) = supervisor.write_input(input.as_bytes()).await {
            warn!(error = %e, "Could not write input");
        }
        if let Err(e) = supervisor.close_input().await {
            warn!(error = %e, "Could not close input");
        }
    }

    let mut stderr_text = Utf8Chunks::new();
    while let Some(event) = supervisor.next_event().await {
        match event {
            Event::Output {
                source: StreamSource::Stdout,
                data,
            } => {
                out.write_all(&data)?;
                out.flush()?;
            }
            Event::Output {
                source: StreamSource::Stderr,
                data,
            } => {
                if style.use_colors {
                    write!(err, "{}", style.stderr_chunk(&stderr_text.push(&data)))?;
                } else {
                    err.write_all(&data)?;
                }
                err.flush()?;
            }
            Event::StreamError { source, error } => {
                writeln!(err, "{}", style.warning(&format!("{}: {}", source, error)))?;
            }
            Event::Exited(outcome) => debug!(outcome = %outcome, "Completion received"),
        }
    }

    let rest = stderr_text.finish();
    if !rest.is_empty() {
        write!(err, "{}", style.stderr_chunk(&rest))?;
    }

    let outcome = supervisor
        .outcome()
        .cloned()
        .ok_or(ProcessError::WatcherLost)?;
    Ok(outcome)
}

/// Process exit code for a run outcome
///
/// Signals map to the shell convention of 128 + signal.
pub fn exit_code(outcome: &ExitOutcome) -> i32 {
    match outcome {
        ExitOutcome::Success => 0,
        ExitOutcome::Failure { code: Some(code), .. } => *code,
        ExitOutcome::Failure {
            signal: Some(signal),
            ..
        } => 128 + signal,
        ExitOutcome::Failure { .. } | ExitOutcome::Error(_) => 1,
    }
}
