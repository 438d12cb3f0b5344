//! Launch, liveness and termination of the supervised child.
//!
//! The child runs in its own process group with both output pipes drained by
//! [`OutputDrain`] threads. Every access to the [`Child`] handle goes through
//! one mutex, so liveness queries from a monitor never race a termination in
//! progress. Termination is graceful first (`SIGTERM` to the group), then
//! forced (`SIGKILL`), each bounded by the grace period.

mod drain;
mod errors;
pub(crate) mod signal;

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

pub(crate) use drain::{OutputDrain, StreamKind};
pub use errors::LaunchError;

/// Log target for process supervision.
pub(crate) const PROCESS_TARGET: &str = "sidecar_host::process";
/// Log target for forwarded child and toolchain output.
pub(crate) const OUTPUT_TARGET: &str = "sidecar_host::output";

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const SERVICE_TAIL_LINES: usize = 20;
const SERVICE_ORIGIN: &str = "service";

/// Polls `child` until it exits or `timeout` elapses.
///
/// Returns `Ok(None)` when the child is still running at the deadline.
pub(crate) fn wait_for_exit(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

/// Result of a [`ProcessSupervisor::terminate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// The child had already exited; no signal was sent.
    AlreadyExited,
    /// The child exited within the grace period after the stop request.
    Graceful,
    /// The child exited only after a forced kill.
    Forced,
    /// The child was still running after the forced-kill wait.
    Unresponsive,
    /// Termination already ran on this handle.
    AlreadyTerminated,
}

impl TerminationOutcome {
    /// Whether this call sent any signal to the child.
    #[must_use]
    pub const fn signalled(self) -> bool {
        matches!(self, Self::Graceful | Self::Forced | Self::Unresponsive)
    }
}

#[derive(Debug)]
enum ChildState {
    Running(Child),
    Exited(ExitStatus),
    Terminated,
}

/// Handle to a launched child and the readers draining its output.
///
/// Only [`ProcessSupervisor::terminate`] and liveness queries touch the
/// underlying process.
#[derive(Debug)]
pub struct SupervisedProcess {
    pid: u32,
    executable: PathBuf,
    state: Mutex<ChildState>,
    drains: Mutex<Vec<OutputDrain>>,
}

impl SupervisedProcess {
    /// Operating-system process identifier.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Path of the running executable.
    #[must_use]
    pub fn executable(&self) -> &Path {
        self.executable.as_path()
    }

    /// Non-blocking liveness check.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|poison| poison.into_inner());
        let status = match &mut *state {
            ChildState::Running(child) => match child.try_wait() {
                Ok(None) => return true,
                Ok(Some(status)) => status,
                Err(error) => {
                    warn!(
                        target: PROCESS_TARGET,
                        pid = self.pid,
                        %error,
                        "failed to query child status"
                    );
                    return false;
                }
            },
            ChildState::Exited(_) | ChildState::Terminated => return false,
        };
        info!(target: PROCESS_TARGET, pid = self.pid, %status, "service process exited");
        *state = ChildState::Exited(status);
        false
    }

    /// Exit status, when the child is known to have exited on its own.
    #[must_use]
    pub fn exit_status(&self) -> Option<ExitStatus> {
        let state = self.state.lock().unwrap_or_else(|poison| poison.into_inner());
        match &*state {
            ChildState::Exited(status) => Some(*status),
            ChildState::Running(_) | ChildState::Terminated => None,
        }
    }

    /// Joins the output readers and returns their buffered tails, stdout
    /// first. Readers already joined contribute nothing.
    pub(crate) fn join_output(&self, timeout: Duration) -> Vec<String> {
        let drains = {
            let mut guard = self.drains.lock().unwrap_or_else(|poison| poison.into_inner());
            std::mem::take(&mut *guard)
        };
        drains
            .into_iter()
            .flat_map(|drain| drain.join_timeout(timeout))
            .collect()
    }
}

/// Starts and stops supervised children.
#[derive(Debug, Clone, Copy)]
pub struct ProcessSupervisor {
    drain_timeout: Duration,
}

impl ProcessSupervisor {
    /// Builds a supervisor that waits up to `drain_timeout` for output readers
    /// to finish during teardown.
    #[must_use]
    pub const fn new(drain_timeout: Duration) -> Self {
        Self { drain_timeout }
    }

    /// Starts `executable` with `args` in `work_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError`] when the executable is missing, cannot be
    /// started, or its output cannot be captured.
    pub fn launch(
        &self,
        executable: &Path,
        args: &[String],
        work_dir: &Path,
    ) -> Result<SupervisedProcess, LaunchError> {
        if !executable.is_file() {
            return Err(LaunchError::MissingExecutable {
                path: executable.to_path_buf(),
            });
        }

        let mut command = Command::new(executable);
        command
            .args(args)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        signal::isolate_group(&mut command);

        let mut child = command.spawn().map_err(|source| LaunchError::Spawn {
            path: executable.to_path_buf(),
            source,
        })?;
        let pid = child.id();
        info!(
            target: PROCESS_TARGET,
            pid,
            executable = %executable.display(),
            args = ?args,
            work_dir = %work_dir.display(),
            "service process started"
        );

        let drains = match spawn_drains(&mut child, executable) {
            Ok(drains) => drains,
            Err(error) => {
                signal::force_kill(pid);
                drop(child.kill());
                drop(wait_for_exit(&mut child, self.drain_timeout));
                return Err(error);
            }
        };

        Ok(SupervisedProcess {
            pid,
            executable: executable.to_path_buf(),
            state: Mutex::new(ChildState::Running(child)),
            drains: Mutex::new(drains),
        })
    }

    /// Non-blocking liveness check.
    #[must_use]
    pub fn is_alive(&self, process: &SupervisedProcess) -> bool {
        process.is_alive()
    }

    /// Stops the child: graceful request, then forced kill, each bounded by
    /// `grace_period`, then joins the output readers.
    ///
    /// Never fails; an already-exited child is logged and skipped. Repeated
    /// calls return [`TerminationOutcome::AlreadyTerminated`].
    pub fn terminate(
        &self,
        process: &SupervisedProcess,
        grace_period: Duration,
    ) -> TerminationOutcome {
        let mut state = process
            .state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let outcome = match std::mem::replace(&mut *state, ChildState::Terminated) {
            ChildState::Terminated => {
                debug!(target: PROCESS_TARGET, pid = process.pid, "termination already ran");
                return TerminationOutcome::AlreadyTerminated;
            }
            ChildState::Exited(status) => {
                info!(
                    target: PROCESS_TARGET,
                    pid = process.pid,
                    %status,
                    "service process had already exited"
                );
                TerminationOutcome::AlreadyExited
            }
            ChildState::Running(mut child) => stop_child(&mut child, process.pid, grace_period),
        };
        drop(state);

        let tail = process.join_output(self.drain_timeout);
        debug!(
            target: PROCESS_TARGET,
            pid = process.pid,
            ?outcome,
            buffered_lines = tail.len(),
            "service process terminated"
        );
        outcome
    }
}

fn spawn_drains(child: &mut Child, executable: &Path) -> Result<Vec<OutputDrain>, LaunchError> {
    let capture_error = |stream: &'static str, source: std::io::Error| LaunchError::Capture {
        path: executable.to_path_buf(),
        stream,
        source,
    };
    let stdout = child.stdout.take().ok_or_else(|| {
        capture_error("stdout", std::io::Error::other("stdout was not piped"))
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        capture_error("stderr", std::io::Error::other("stderr was not piped"))
    })?;
    let out = OutputDrain::spawn(SERVICE_ORIGIN, StreamKind::Stdout, stdout, SERVICE_TAIL_LINES)
        .map_err(|source| capture_error("stdout", source))?;
    let err = OutputDrain::spawn(SERVICE_ORIGIN, StreamKind::Stderr, stderr, SERVICE_TAIL_LINES)
        .map_err(|source| capture_error("stderr", source))?;
    Ok(vec![out, err])
}

fn stop_child(child: &mut Child, pid: u32, grace_period: Duration) -> TerminationOutcome {
    match child.try_wait() {
        Ok(Some(status)) => {
            info!(target: PROCESS_TARGET, pid, %status, "service process had already exited");
            return TerminationOutcome::AlreadyExited;
        }
        Ok(None) => {}
        Err(error) => {
            warn!(target: PROCESS_TARGET, pid, %error, "failed to query child status before stopping");
        }
    }

    // Without a group signal there is nothing graceful to wait for.
    if signal::request_stop(pid) {
        info!(
            target: PROCESS_TARGET,
            pid,
            grace_ms = u64::try_from(grace_period.as_millis()).unwrap_or(u64::MAX),
            "stop requested"
        );
        match wait_for_exit(child, grace_period) {
            Ok(Some(status)) => {
                info!(target: PROCESS_TARGET, pid, %status, "service process stopped");
                return TerminationOutcome::Graceful;
            }
            Ok(None) => {
                warn!(target: PROCESS_TARGET, pid, "service process ignored stop request; killing");
            }
            Err(error) => {
                warn!(target: PROCESS_TARGET, pid, %error, "failed waiting for graceful exit; killing");
            }
        }
    }

    signal::force_kill(pid);
    if let Err(error) = child.kill() {
        debug!(target: PROCESS_TARGET, pid, %error, "direct kill failed");
    }
    match wait_for_exit(child, grace_period) {
        Ok(Some(status)) => {
            info!(target: PROCESS_TARGET, pid, %status, "service process killed");
            TerminationOutcome::Forced
        }
        Ok(None) => {
            warn!(target: PROCESS_TARGET, pid, "service process survived forced kill");
            TerminationOutcome::Unresponsive
        }
        Err(error) => {
            warn!(target: PROCESS_TARGET, pid, %error, "failed waiting for forced exit");
            TerminationOutcome::Unresponsive
        }
    }
}
