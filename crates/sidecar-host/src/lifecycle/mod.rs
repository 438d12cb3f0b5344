//! The start and teardown state machine.
//!
//! [`LifecycleController`] owns the workspace and the supervised child behind
//! a single mutex. `start` and `stop` both hold it for their whole run, so a
//! monitor-triggered stop and an explicit shutdown serialise: the second
//! caller sees [`LifecycleState::Stopped`] and does nothing.

mod monitor;
mod settings;
mod state;

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, info, warn};

pub(crate) use monitor::HealthMonitor;
pub use settings::ControllerSettings;
pub use state::LifecycleState;

use crate::errors::LifecycleError;
use crate::health::{HealthChecker, HealthReport, ProbeError, ReadinessProbe};
use crate::process::{ProcessSupervisor, SupervisedProcess, TerminationOutcome};
use crate::reporter::LifecycleReporter;
use crate::toolchain::{BuildError, BuildOrchestrator, Toolchain};
use crate::workspace::{Workspace, WorkspaceManager};

/// Log target for lifecycle transitions.
pub(crate) const LIFECYCLE_TARGET: &str = "sidecar_host::lifecycle";

/// What a teardown released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeardownSummary {
    termination: Option<TerminationOutcome>,
    workspace_removed: bool,
    workspace_retained: bool,
}

impl TeardownSummary {
    /// Outcome of terminating the child, when one was running.
    #[must_use]
    pub const fn termination(&self) -> Option<TerminationOutcome> {
        self.termination
    }

    /// Whether the workspace was deleted completely.
    #[must_use]
    pub const fn workspace_removed(&self) -> bool {
        self.workspace_removed
    }

    /// Whether a failed start's workspace was left for inspection.
    #[must_use]
    pub const fn workspace_retained(&self) -> bool {
        self.workspace_retained
    }
}

#[derive(Debug)]
struct Inner {
    state: LifecycleState,
    workspace: Option<Workspace>,
    process: Option<SupervisedProcess>,
}

impl Inner {
    const fn holds_resources(&self) -> bool {
        self.workspace.is_some() || self.process.is_some()
    }
}

/// Sequences reclamation, provisioning, build, launch and health check, and
/// owns the idempotent teardown.
#[derive(Debug)]
pub struct LifecycleController {
    settings: ControllerSettings,
    workspaces: WorkspaceManager,
    builder: BuildOrchestrator,
    supervisor: ProcessSupervisor,
    health: HealthChecker,
    reporter: Arc<dyn LifecycleReporter>,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for dyn LifecycleReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LifecycleReporter")
    }
}

impl LifecycleController {
    /// Assembles a controller from its settings and collaborators.
    #[must_use]
    pub fn new(
        settings: ControllerSettings,
        toolchain: Box<dyn Toolchain>,
        probe: Option<Arc<dyn ReadinessProbe>>,
        reporter: Arc<dyn LifecycleReporter>,
    ) -> Self {
        Self {
            workspaces: WorkspaceManager::new(settings.layout.clone()),
            builder: BuildOrchestrator::new(toolchain, settings.build_timeout),
            supervisor: ProcessSupervisor::new(settings.grace_period),
            health: HealthChecker::new(settings.settle_delay, settings.confirm_window, probe),
            reporter,
            inner: Mutex::new(Inner {
                state: LifecycleState::Uninitialized,
                workspace: None,
                process: None,
            }),
            settings,
        }
    }

    /// Settings the controller was built with.
    #[must_use]
    pub const fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Current state. Blocks while a start or stop is in progress.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.lock().state
    }

    /// Whether the service passed its health check and is not torn down.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Whether a supervised child exists and is still alive.
    #[must_use]
    pub fn child_alive(&self) -> bool {
        self.lock()
            .process
            .as_ref()
            .is_some_and(SupervisedProcess::is_alive)
    }

    /// Pid of the running child, if any.
    #[must_use]
    pub fn child_pid(&self) -> Option<u32> {
        self.lock().process.as_ref().map(SupervisedProcess::pid)
    }

    /// Runs the readiness probe once, when one is configured.
    #[must_use]
    pub fn probe_readiness(&self) -> Option<Result<u16, ProbeError>> {
        self.health.probe().map(|probe| probe.probe())
    }

    /// Brings the service up.
    ///
    /// Calling it while already running is a no-op. On failure the controller
    /// moves to [`LifecycleState::Failed`], releases whatever it acquired and
    /// returns the original error.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] naming the failed stage, or
    /// [`LifecycleError::InvalidState`] when called after a failure or stop.
    pub fn start(&self) -> Result<(), LifecycleError> {
        let mut inner = self.lock();
        match inner.state {
            LifecycleState::Uninitialized => {}
            LifecycleState::Running => return Ok(()),
            state => return Err(LifecycleError::InvalidState { state }),
        }

        match self.run_start(&mut inner) {
            Ok((pid, report)) => {
                self.enter(&mut inner, LifecycleState::Running);
                self.reporter.service_running(pid, &report);
                Ok(())
            }
            Err(error) => {
                self.enter(&mut inner, LifecycleState::Failed);
                self.reporter.start_failed(&error);
                let retain = self.settings.failed_workspace.retains();
                let summary = self.release(&mut inner, retain);
                self.reporter.teardown_completed(&summary);
                Err(error)
            }
        }
    }

    /// Tears the service down: child first, then the workspace.
    ///
    /// Safe to call repeatedly and from several threads; only the first call
    /// after a start does any work. Failures are logged, never returned.
    pub fn stop(&self) {
        let mut inner = self.lock();
        match inner.state {
            LifecycleState::Stopped => {
                debug!(target: LIFECYCLE_TARGET, "already stopped");
                return;
            }
            LifecycleState::Uninitialized => {
                self.enter(&mut inner, LifecycleState::Stopped);
                return;
            }
            _ => {}
        }

        let held = inner.holds_resources();
        self.enter(&mut inner, LifecycleState::ShuttingDown);
        let summary = self.release(&mut inner, false);
        self.enter(&mut inner, LifecycleState::Stopped);
        if held {
            self.reporter.teardown_completed(&summary);
        } else {
            debug!(target: LIFECYCLE_TARGET, "nothing left to release");
        }
    }

    fn run_start(&self, inner: &mut Inner) -> Result<(u32, HealthReport), LifecycleError> {
        self.enter(inner, LifecycleState::ReclaimingOrphans);
        let reclaimed = self.workspaces.reclaim_orphans();
        debug!(
            target: LIFECYCLE_TARGET,
            removed = reclaimed.removed().len(),
            "orphans reclaimed"
        );

        self.enter(inner, LifecycleState::Provisioning);
        let workspace = self.workspaces.provision(&self.settings.source_root)?;
        inner.workspace = Some(workspace.clone());

        self.enter(inner, LifecycleState::Building);
        let build = self.builder.build(&workspace, &self.settings.entry_file)?;
        if !build.is_success() {
            return Err(BuildError::MissingArtifact {
                path: build.executable().to_path_buf(),
            }
            .into());
        }

        self.enter(inner, LifecycleState::Launching);
        let process = self.supervisor.launch(
            build.executable(),
            &self.settings.launch_args,
            workspace.root(),
        )?;
        let pid = process.pid();

        self.enter(inner, LifecycleState::HealthChecking);
        let launched = inner.process.insert(process);
        let report = self.health.verify(launched)?;
        Ok((pid, report))
    }

    fn release(&self, inner: &mut Inner, retain_workspace: bool) -> TeardownSummary {
        let mut summary = TeardownSummary {
            termination: inner
                .process
                .take()
                .map(|process| self.supervisor.terminate(&process, self.settings.grace_period)),
            ..TeardownSummary::default()
        };

        if let Some(workspace) = inner.workspace.take() {
            if retain_workspace {
                info!(
                    target: LIFECYCLE_TARGET,
                    workspace = %workspace.root().display(),
                    "keeping failed workspace; the next start reclaims it"
                );
                summary.workspace_retained = true;
            } else {
                match self.workspaces.destroy(&workspace) {
                    Ok(()) => summary.workspace_removed = true,
                    Err(error) => warn!(
                        target: LIFECYCLE_TARGET,
                        %error,
                        "workspace teardown incomplete"
                    ),
                }
            }
        }
        summary
    }

    fn enter(&self, inner: &mut Inner, state: LifecycleState) {
        debug!(target: LIFECYCLE_TARGET, from = %inner.state, to = %state, "lifecycle transition");
        inner.state = state;
        self.reporter.stage_entered(state);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        self.stop();
    }
}
