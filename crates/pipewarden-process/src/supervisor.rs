//! Process supervisor - one child, three workers, one event sequence

use std::future;
use std::io;
use std::process::Stdio;
use std::sync::Arc;

use futures::stream::{self, Stream};
use tokio::io::AsyncWriteExt;
use tokio::process::{ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::ProcessConfig,
    drainer::{DrainReport, Drainer},
    error::{ProcessError, Result},
    event::{Event, ExitOutcome, Output, StreamSource, SupervisorState},
    watcher::Watcher,
};

type StreamRx = mpsc::UnboundedReceiver<Event>;

enum WorkerExit {
    Drained(DrainReport),
    Watched,
}

enum Step {
    Stream(StreamSource, Option<Event>),
    Completion(ExitOutcome),
}

/// Supervises a single child process from launch to termination
///
/// Each captured output stream is drained on its own task and the exit is
/// awaited on a third, so a full pipe never stalls the other sources. The
/// event sequence ends only after stdout is closed, stderr is closed and the
/// completion event has been delivered.
///
/// One instance manages exactly one process lifecycle.
pub struct Supervisor {
    pid: u32,
    command: String,
    stdin: Option<ChildStdin>,
    stdout: Option<StreamRx>,
    stderr: Option<StreamRx>,
    completion: Option<oneshot::Receiver<ExitOutcome>>,
    initial_sources: usize,
    outcome: Option<ExitOutcome>,
    workers: JoinSet<WorkerExit>,
    reports: Vec<DrainReport>,
    cancel: CancellationToken,
    state: SupervisorState,
}

impl Supervisor {
    /// Launch the child and its drainer and watcher workers
    ///
    /// Must be called within a Tokio runtime. Nothing is spawned when the
    /// configuration is invalid or the executable cannot be launched.
    ///
    /// # Examples
    /// ```no_run
    /// use pipewarden_process::{ProcessConfig, Supervisor};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let config = ProcessConfig::new("/bin/sh").args(["-c", "cat"]);
    /// let mut supervisor = Supervisor::start(config)?;
    /// supervisor.write_input(b"a\nb\nc\n").await?;
    /// supervisor.close_input().await?;
    /// let output = supervisor.output().await;
    /// assert_eq!(output.stdout, b"a\nb\nc\n");
    /// # Ok(())
    /// # }
    /// ```
    pub fn start(config: ProcessConfig) -> Result<Self> {
        config.validate()?;

        debug!(
            command = %config.command,
            args = ?config.args,
            "Starting supervised process"
        );

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .env_clear()
            .envs(config.child_env())
            .kill_on_drop(true);

        if let Some(ref dir) = config.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(piped_or_null(config.pipe_stdin));
        cmd.stdout(piped_or_null(config.capture_stdout));
        cmd.stderr(piped_or_null(config.capture_stderr));

        // Own process group so termination reaches descendants too
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|error| ProcessError::SpawnFailed {
            command: config.command.clone(),
            error,
        })?;
        let pid = child.id().ok_or_else(|| ProcessError::SpawnFailed {
            command: config.command.clone(),
            error: io::Error::other("Failed to get process ID"),
        })?;

        info!(pid = %pid, command = %config.command, "Process spawned");

        let mut workers = JoinSet::new();
        let cancel = CancellationToken::new();

        let stdout = child.stdout.take().map(|reader| {
            let (tx, rx) = mpsc::unbounded_channel();
            let drainer = Drainer::new(StreamSource::Stdout).buffer_size(config.read_buffer_size);
            workers.spawn(async move { WorkerExit::Drained(drainer.run(reader, tx).await) });
            rx
        });
        let stderr = child.stderr.take().map(|reader| {
            let (tx, rx) = mpsc::unbounded_channel();
            let drainer = Drainer::new(StreamSource::Stderr).buffer_size(config.read_buffer_size);
            workers.spawn(async move { WorkerExit::Drained(drainer.run(reader, tx).await) });
            rx
        });
        let stdin = child.stdin.take();

        let (completion_tx, completion_rx) = oneshot::channel();
        let watcher = Watcher::new(pid, config.timeout, config.kill_grace, cancel.clone());
        workers.spawn(async move {
            watcher.run(child, completion_tx).await;
            WorkerExit::Watched
        });

        let initial_sources = 1 + usize::from(stdout.is_some()) + usize::from(stderr.is_some());

        Ok(Self {
            pid,
            command: config.command,
            stdin,
            stdout,
            stderr,
            completion: Some(completion_rx),
            initial_sources,
            outcome: None,
            workers,
            reports: Vec::with_capacity(2),
            cancel,
            state: SupervisorState::Started,
        })
    }

    /// Get process ID
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Get the launched command
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Current lifecycle state
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Completion outcome, once it has been delivered
    pub fn outcome(&self) -> Option<&ExitOutcome> {
        self.outcome.as_ref()
    }

    /// Drainer summaries, filled in when [`Supervisor::next_event`] returns `None`
    pub fn drain_reports(&self) -> &[DrainReport] {
        &self.reports
    }

    /// Write bytes to the child's input
    ///
    /// May block while the child is not consuming input; see
    /// [`Supervisor::spawn_input_writer`] for children that produce output first.
    pub async fn write_input(&mut self, data: &[u8]) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or(ProcessError::InputClosed)?;
        stdin.write_all(data).await.map_err(ProcessError::WriteFailed)?;
        stdin.flush().await.map_err(ProcessError::WriteFailed)
    }

    /// Close the child's input; closing twice is a no-op
    pub async fn close_input(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            debug!(pid = %self.pid, "Closing process input");
            stdin.shutdown().await.map_err(ProcessError::CloseFailed)?;
        }
        Ok(())
    }

    /// Hand the input to its own task, which writes `data` then closes it
    pub fn spawn_input_writer(&mut self, data: Vec<u8>) -> Result<JoinHandle<Result<()>>> {
        let mut stdin = self.stdin.take().ok_or(ProcessError::InputClosed)?;
        let pid = self.pid;

        Ok(tokio::spawn(async move {
            stdin.write_all(&data).await.map_err(ProcessError::WriteFailed)?;
            stdin.shutdown().await.map_err(ProcessError::CloseFailed)?;
            debug!(pid = %pid, bytes = data.len(), "Input writer finished");
            Ok(())
        }))
    }

    /// Request termination
    ///
    /// Closes input and signals the process group. The event sequence still
    /// runs until every source reaches its terminal state.
    pub fn cancel(&mut self) {
        debug!(pid = %self.pid, "Cancelling supervised process");
        self.stdin = None;
        self.cancel.cancel();
    }

    /// Next event from any live source, in arrival order
    ///
    /// Returns `None` once stdout and stderr are closed and the completion
    /// event has been delivered, after every worker has finished.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            if self.live_sources() == 0 {
                self.finish().await;
                return None;
            }

            let step = tokio::select! {
                event = recv_stream(&mut self.stdout), if self.stdout.is_some() => {
                    Step::Stream(StreamSource::Stdout, event)
                }
                event = recv_stream(&mut self.stderr), if self.stderr.is_some() => {
                    Step::Stream(StreamSource::Stderr, event)
                }
                outcome = recv_completion(&mut self.completion), if self.completion.is_some() => {
                    Step::Completion(outcome)
                }
            };

            match step {
                Step::Stream(_, Some(event)) => return Some(event),
                Step::Stream(source, None) => {
                    match source {
                        StreamSource::Stdout => self.stdout = None,
                        StreamSource::Stderr => self.stderr = None,
                    }
                    debug!(pid = %self.pid, stream = %source, "Stream closed");
                    self.update_state();
                }
                Step::Completion(outcome) => {
                    self.completion = None;
                    self.outcome = Some(outcome.clone());
                    self.update_state();
                    return Some(Event::Exited(outcome));
                }
            }
        }
    }

    /// The event sequence as a stream
    pub fn events(&mut self) -> impl Stream<Item = Event> + '_ {
        stream::unfold(self, |supervisor| async move {
            supervisor.next_event().await.map(|event| (event, supervisor))
        })
    }

    /// Close input, drain every event and return the exit outcome
    pub async fn wait(&mut self) -> ExitOutcome {
        self.wait_with(|_| {}).await
    }

    /// Like [`Supervisor::wait`], handing each non-terminal event to `consumer`
    pub async fn wait_with<F>(&mut self, mut consumer: F) -> ExitOutcome
    where
        F: FnMut(Event),
    {
        if let Err(e) = self.close_input().await {
            warn!(pid = %self.pid, error = %e, "Failed to close input before waiting");
        }

        while let Some(event) = self.next_event().await {
            if !event.is_terminal() {
                consumer(event);
            }
        }

        self.outcome
            .clone()
            .unwrap_or_else(|| ExitOutcome::Error(Arc::new(ProcessError::WatcherLost)))
    }

    /// Close input and buffer all output until termination
    pub async fn output(&mut self) -> Output {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut stream_errors = Vec::new();

        let outcome = self
            .wait_with(|event| match event {
                Event::Output {
                    source: StreamSource::Stdout,
                    data,
                } => stdout.extend_from_slice(&data),
                Event::Output {
                    source: StreamSource::Stderr,
                    data,
                } => stderr.extend_from_slice(&data),
                Event::StreamError { error, .. } => stream_errors.push(error),
                Event::Exited(_) => {}
            })
            .await;

        Output {
            stdout,
            stderr,
            stream_errors,
            outcome,
        }
    }

    fn live_sources(&self) -> usize {
        usize::from(self.stdout.is_some())
            + usize::from(self.stderr.is_some())
            + usize::from(self.completion.is_some())
    }

    // Terminated is only entered from finish(), after the workers are joined
    fn update_state(&mut self) {
        let next = match self.live_sources() {
            n if n == self.initial_sources => SupervisorState::Started,
            _ => SupervisorState::Draining,
        };
        self.set_state(next);
    }

    fn set_state(&mut self, next: SupervisorState) {
        if next != self.state {
            debug!(pid = %self.pid, from = ?self.state, to = ?next, "Supervisor state changed");
            self.state = next;
        }
    }

    /// Join every worker; runs once, when all sources are terminal
    async fn finish(&mut self) {
        while let Some(joined) = self.workers.join_next().await {
            match joined {
                Ok(WorkerExit::Drained(report)) => self.reports.push(report),
                Ok(WorkerExit::Watched) => {}
                Err(e) => warn!(pid = %self.pid, error = %e, "Supervisor worker failed"),
            }
        }
        self.set_state(SupervisorState::Terminated);
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if self.state != SupervisorState::Terminated {
            debug!(pid = %self.pid, "Supervisor dropped early, terminating process");
            self.cancel.cancel();
            // Let the watcher finish terminating the group instead of aborting it
            self.workers.detach_all();
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("pid", &self.pid)
            .field("command", &self.command)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn piped_or_null(piped: bool) -> Stdio {
    if piped {
        Stdio::piped()
    } else {
        Stdio::null()
    }
}

async fn recv_stream(rx: &mut Option<StreamRx>) -> Option<Event> {
    match rx {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

async fn recv_completion(rx: &mut Option<oneshot::Receiver<ExitOutcome>>) -> ExitOutcome {
    match rx {
        Some(rx) => rx
            .await
            .unwrap_or_else(|_| ExitOutcome::Error(Arc::new(ProcessError::WatcherLost))),
        None => future::pending().await,
    }
}
