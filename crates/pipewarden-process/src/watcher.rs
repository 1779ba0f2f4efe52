//! Completion watcher - waits for the child to exit

use std::future;
use std::io;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{error::ProcessError, event::ExitOutcome};

/// Owns the child handle (stdio already taken) and reports its exit once
pub(crate) struct Watcher {
    pid: u32,
    timeout: Option<Duration>,
    kill_grace: Duration,
    cancel: CancellationToken,
}

impl Watcher {
    pub(crate) fn new(
        pid: u32,
        timeout: Option<Duration>,
        kill_grace: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pid,
            timeout,
            kill_grace,
            cancel,
        }
    }

    /// Wait for exit, then send exactly one outcome
    pub(crate) async fn run(self, mut child: Child, tx: oneshot::Sender<ExitOutcome>) {
        debug!(pid = %self.pid, "Watcher started");

        let outcome = self.watch(&mut child).await;
        info!(pid = %self.pid, outcome = %outcome, "Process exited");

        if tx.send(outcome).is_err() {
            debug!(pid = %self.pid, "Supervisor gone before completion was delivered");
        }
        // `child` dropped here: wait resources released
    }

    async fn watch(&self, child: &mut Child) -> ExitOutcome {
        let deadline = async {
            match self.timeout {
                Some(timeout) => sleep(timeout).await,
                None => future::pending().await,
            }
        };

        tokio::select! {
            status = child.wait() => outcome_of(status),
            _ = self.cancel.cancelled() => {
                debug!(pid = %self.pid, "Cancellation requested");
                self.terminate(child).await
            }
            _ = deadline => {
                let millis = self.timeout.map(|t| t.as_millis() as u64).unwrap_or_default();
                warn!(pid = %self.pid, timeout_ms = millis, "Process exceeded timeout, terminating");
                match self.terminate(child).await {
                    ExitOutcome::Error(e) => ExitOutcome::Error(e),
                    _ => ExitOutcome::Error(Arc::new(ProcessError::Timeout { millis })),
                }
            }
        }
    }

    /// SIGTERM the process group, escalate to SIGKILL after the grace period
    async fn terminate(&self, child: &mut Child) -> ExitOutcome {
        self.signal_group(child, false);

        let status = match tokio::time::timeout(self.kill_grace, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                debug!(pid = %self.pid, "Grace period elapsed, escalating to SIGKILL");
                self.signal_group(child, true);
                child.wait().await
            }
        };

        // Descendants still holding the output pipes would keep the drainers open.
        self.sweep_group();
        outcome_of(status)
    }

    #[cfg(unix)]
    fn signal_group(&self, child: &mut Child, force: bool) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };
        match killpg(Pid::from_raw(self.pid as i32), signal) {
            Ok(()) => debug!(pid = %self.pid, signal = ?signal, "Signalled process group"),
            Err(e) => {
                warn!(pid = %self.pid, error = %e, "Failed to signal process group, killing process only");
                if let Err(e) = child.start_kill() {
                    let err = ProcessError::KillFailed(e.to_string());
                    warn!(pid = %self.pid, error = %err, "Kill failed");
                }
            }
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&self, child: &mut Child, _force: bool) {
        if let Err(e) = child.start_kill() {
            let err = ProcessError::KillFailed(e.to_string());
            warn!(pid = %self.pid, error = %err, "Kill failed");
        }
    }

    #[cfg(unix)]
    fn sweep_group(&self) {
        use nix::sys::signal::{killpg, Signal};
        use nix::unistd::Pid;

        // ESRCH just means the group is already empty
        let _ = killpg(Pid::from_raw(self.pid as i32), Signal::SIGKILL);
    }

    #[cfg(not(unix))]
    fn sweep_group(&self) {}
}

fn outcome_of(status: io::Result<ExitStatus>) -> ExitOutcome {
    match status {
        Ok(status) => ExitOutcome::from(status),
        Err(e) => {
            warn!(error = %e, "Waiting for process failed");
            ExitOutcome::Error(Arc::new(ProcessError::WaitFailed(e)))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;
    use std::time::Instant;
    use tokio::process::Command;

    fn spawn(script: &str) -> (Child, u32) {
        let mut cmd = Command::new("/bin/sh");
        cmd.args(["-c", script])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0);
        let child = cmd.spawn().unwrap();
        let pid = child.id().unwrap();
        (child, pid)
    }

    #[tokio::test]
    async fn test_reports_exit_code() {
        let (child, pid) = spawn("exit 3");
        let (tx, rx) = oneshot::channel();
        Watcher::new(pid, None, Duration::from_millis(200), CancellationToken::new())
            .run(child, tx)
            .await;

        let outcome = rx.await.unwrap();
        assert_eq!(outcome.code(), Some(3));
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_cancel_terminates() {
        let (child, pid) = spawn("sleep 30");
        let cancel = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        let watcher = Watcher::new(pid, None, Duration::from_millis(200), cancel.clone());
        let handle = tokio::spawn(watcher.run(child, tx));

        let started = Instant::now();
        cancel.cancel();
        handle.await.unwrap();

        let outcome = rx.await.unwrap();
        assert!(matches!(outcome, ExitOutcome::Failure { code: None, signal: Some(_) }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_timeout_reports_error() {
        let (child, pid) = spawn("sleep 30");
        let (tx, rx) = oneshot::channel();
        Watcher::new(
            pid,
            Some(Duration::from_millis(100)),
            Duration::from_millis(200),
            CancellationToken::new(),
        )
        .run(child, tx)
        .await;

        let outcome = rx.await.unwrap();
        assert!(matches!(
            outcome.error(),
            Some(ProcessError::Timeout { millis: 100 })
        ));
    }
}
