//! Behavioural tests for the start and teardown sequence.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use sidecar_config::FailedWorkspacePolicy;

use super::support::{
    RecordingReporter, ScriptToolchain, source_tree, test_settings, wait_until, workspace_dirs,
};
use crate::errors::{FailureKind, LifecycleError};
use crate::lifecycle::{ControllerSettings, LifecycleController, LifecycleState};
use crate::process::TerminationOutcome;
use crate::reporter::LifecycleReporter;
use crate::service::EmbeddedService;

type StepResult = Result<(), String>;

const ALL_KINDS: [FailureKind; 6] = [
    FailureKind::Provisioning,
    FailureKind::BuildTimeout,
    FailureKind::BuildFailed,
    FailureKind::Launch,
    FailureKind::HealthCheck,
    FailureKind::InvalidState,
];

// The service is declared first so it is torn down before the directories.
struct LifecycleWorld {
    service: Option<EmbeddedService>,
    temp_root: TempDir,
    _source: TempDir,
    settings: ControllerSettings,
    toolchain: Option<ScriptToolchain>,
    monitor_interval: Option<Duration>,
    reporter: Arc<RecordingReporter>,
    outcome: Option<Result<(), LifecycleError>>,
    elapsed: Duration,
    leftover: Option<PathBuf>,
}

impl LifecycleWorld {
    fn new() -> Self {
        let temp_root = TempDir::new().expect("create temp root");
        let source = source_tree();
        let settings = test_settings(temp_root.path(), source.path());
        Self {
            temp_root,
            _source: source,
            settings,
            toolchain: None,
            monitor_interval: None,
            reporter: Arc::new(RecordingReporter::default()),
            service: None,
            outcome: None,
            elapsed: Duration::ZERO,
            leftover: None,
        }
    }

    fn service(&mut self) -> Result<&EmbeddedService, String> {
        if self.service.is_none() {
            let toolchain = self
                .toolchain
                .take()
                .ok_or_else(|| String::from("no toolchain configured"))?;
            let reporter: Arc<dyn LifecycleReporter> = self.reporter.clone();
            let controller =
                LifecycleController::new(self.settings.clone(), Box::new(toolchain), None, reporter);
            self.service = Some(EmbeddedService::new(controller, self.monitor_interval));
        }
        self.service
            .as_ref()
            .ok_or_else(|| String::from("service missing"))
    }

    fn start(&mut self) -> StepResult {
        let started = Instant::now();
        let result = self.service()?.ensure_running();
        self.elapsed = started.elapsed();
        self.outcome = Some(result);
        Ok(())
    }

    fn existing_service(&self) -> Result<&EmbeddedService, String> {
        self.service
            .as_ref()
            .ok_or_else(|| String::from("service was never created"))
    }

    fn failure_kind(&self) -> Result<FailureKind, String> {
        match &self.outcome {
            Some(Err(error)) => Ok(error.kind()),
            Some(Ok(())) => Err(String::from("start succeeded")),
            None => Err(String::from("start was never attempted")),
        }
    }

    fn health_windows(&self) -> Duration {
        self.settings.settle_delay + self.settings.confirm_window
    }
}

#[fixture]
fn world() -> RefCell<LifecycleWorld> {
    RefCell::new(LifecycleWorld::new())
}

#[given("a leftover workspace from a crashed run")]
fn given_leftover(world: &RefCell<LifecycleWorld>) {
    let mut world = world.borrow_mut();
    let leftover = world.temp_root.path().join("soar-web-crashed");
    fs::create_dir_all(leftover.join("bin")).expect("create leftover workspace");
    fs::write(leftover.join("bin/soar-web"), "stale build").expect("write leftover artefact");
    fs::write(
        world.settings.layout.pointer_path(),
        format!("{}\n", leftover.display()),
    )
    .expect("write pointer");
    world.leftover = Some(leftover);
}

#[given("a toolchain that builds a long-running service")]
fn given_serving_toolchain(world: &RefCell<LifecycleWorld>) {
    world.borrow_mut().toolchain = Some(ScriptToolchain::serving());
}

#[given("a toolchain whose dependency step hangs")]
fn given_hanging_toolchain(world: &RefCell<LifecycleWorld>) {
    world.borrow_mut().toolchain = Some(ScriptToolchain::hanging_resolve());
}

#[given("a toolchain that produces no executable")]
fn given_no_artifact_toolchain(world: &RefCell<LifecycleWorld>) {
    world.borrow_mut().toolchain = Some(ScriptToolchain::no_artifact());
}

#[given("a toolchain that builds a service which exits immediately")]
fn given_exiting_toolchain(world: &RefCell<LifecycleWorld>) {
    world.borrow_mut().toolchain = Some(ScriptToolchain::exiting());
}

#[given("a build timeout of {seconds} second")]
fn given_build_timeout(world: &RefCell<LifecycleWorld>, seconds: u64) {
    world.borrow_mut().settings.build_timeout = Duration::from_secs(seconds);
}

#[given("failed workspaces are retained")]
fn given_retained(world: &RefCell<LifecycleWorld>) {
    world.borrow_mut().settings.failed_workspace = FailedWorkspacePolicy::Retain;
}

#[given("a liveness monitor every {millis} milliseconds")]
fn given_monitor(world: &RefCell<LifecycleWorld>, millis: u64) {
    world.borrow_mut().monitor_interval = Some(Duration::from_millis(millis));
}

#[given("the service is running")]
fn given_running(world: &RefCell<LifecycleWorld>) -> StepResult {
    let mut world = world.borrow_mut();
    world.start()?;
    match world.outcome.take() {
        Some(Ok(())) => Ok(()),
        Some(Err(error)) => Err(format!("start failed: {error}")),
        None => Err(String::from("start did not run")),
    }
}

#[when("the service is started")]
fn when_started(world: &RefCell<LifecycleWorld>) -> StepResult {
    world.borrow_mut().start()
}

#[when("the service is stopped")]
fn when_stopped(world: &RefCell<LifecycleWorld>) -> StepResult {
    world.borrow().existing_service()?.shutdown();
    Ok(())
}

#[when("the service is stopped twice")]
fn when_stopped_twice(world: &RefCell<LifecycleWorld>) -> StepResult {
    let world = world.borrow();
    let service = world.existing_service()?;
    service.shutdown();
    service.shutdown();
    Ok(())
}

#[when("two threads stop the service at once")]
fn when_concurrent_stop(world: &RefCell<LifecycleWorld>) -> StepResult {
    let world = world.borrow();
    let controller = world.existing_service()?.controller();
    thread::scope(|scope| {
        let first = scope.spawn(|| controller.stop());
        let second = scope.spawn(|| controller.stop());
        first.join().expect("first stop panicked");
        second.join().expect("second stop panicked");
    });
    Ok(())
}

#[when("the child is killed externally")]
fn when_killed(world: &RefCell<LifecycleWorld>) -> StepResult {
    let world = world.borrow();
    let service = world.existing_service()?;
    let pid = service
        .controller()
        .child_pid()
        .ok_or_else(|| String::from("no child running"))?;
    let raw = i32::try_from(pid).map_err(|error| error.to_string())?;
    kill(Pid::from_raw(raw), Signal::SIGKILL).map_err(|error| error.to_string())?;
    if world.monitor_interval.is_none()
        && !wait_until(Duration::from_secs(3), || !service.controller().child_alive())
    {
        return Err(format!("child {pid} survived SIGKILL"));
    }
    Ok(())
}

#[then("the start succeeds")]
fn then_start_succeeds(world: &RefCell<LifecycleWorld>) -> StepResult {
    match &world.borrow().outcome {
        Some(Ok(())) => Ok(()),
        Some(Err(error)) => Err(format!("start failed: {error}")),
        None => Err(String::from("start was never attempted")),
    }
}

#[then("the start fails with {kind}")]
fn then_start_fails(world: &RefCell<LifecycleWorld>, kind: String) -> StepResult {
    let expected = ALL_KINDS
        .into_iter()
        .find(|candidate| candidate.label() == kind)
        .ok_or_else(|| format!("unknown failure kind '{kind}'"))?;
    let world = world.borrow();
    let actual = world.failure_kind()?;
    if actual != expected {
        return Err(format!("expected {expected:?}, got {actual:?}"));
    }
    let reported = world
        .reporter
        .events()
        .into_iter()
        .any(|event| event == super::support::LifecycleEvent::StartFailed(expected));
    if reported || expected == FailureKind::InvalidState {
        Ok(())
    } else {
        Err(String::from("reporter missed the failure"))
    }
}

#[then("the leftover workspace is gone")]
fn then_leftover_gone(world: &RefCell<LifecycleWorld>) -> StepResult {
    let world = world.borrow();
    let leftover = world.leftover.as_ref().ok_or("no leftover workspace")?;
    if leftover.exists() {
        Err(format!("{} survived reclamation", leftover.display()))
    } else {
        Ok(())
    }
}

#[then("the start walked every stage in order")]
fn then_stage_order(world: &RefCell<LifecycleWorld>) -> StepResult {
    let stages = world.borrow().reporter.stages();
    let expected = [
        LifecycleState::ReclaimingOrphans,
        LifecycleState::Provisioning,
        LifecycleState::Building,
        LifecycleState::Launching,
        LifecycleState::HealthChecking,
        LifecycleState::Running,
    ];
    if stages == expected {
        Ok(())
    } else {
        Err(format!("stages were {stages:?}"))
    }
}

#[then("liveness was confirmed twice")]
fn then_liveness_twice(world: &RefCell<LifecycleWorld>) -> StepResult {
    let report = world
        .borrow()
        .reporter
        .running_report()
        .ok_or_else(|| String::from("service never reported running"))?;
    if report.liveness_checks() == 2 {
        Ok(())
    } else {
        Err(format!("liveness checks: {}", report.liveness_checks()))
    }
}

#[then("the start waited out both health windows")]
fn then_waited(world: &RefCell<LifecycleWorld>) -> StepResult {
    let world = world.borrow();
    if world.elapsed >= world.health_windows() {
        Ok(())
    } else {
        Err(format!("start returned after {:?}", world.elapsed))
    }
}

#[then("the failure was reported before the health windows elapsed")]
fn then_failed_fast(world: &RefCell<LifecycleWorld>) -> StepResult {
    let world = world.borrow();
    if world.elapsed < world.health_windows() {
        Ok(())
    } else {
        Err(format!("start took {:?}", world.elapsed))
    }
}

#[then("the start finished within {seconds} seconds")]
fn then_bounded(world: &RefCell<LifecycleWorld>, seconds: u64) -> StepResult {
    let elapsed = world.borrow().elapsed;
    if elapsed < Duration::from_secs(seconds) {
        Ok(())
    } else {
        Err(format!("start took {elapsed:?}"))
    }
}

#[then("exactly {count} workspace exists")]
fn then_workspace_count(world: &RefCell<LifecycleWorld>, count: usize) -> StepResult {
    let dirs = workspace_dirs(world.borrow().temp_root.path());
    if dirs.len() == count {
        Ok(())
    } else {
        Err(format!("workspaces: {dirs:?}"))
    }
}

#[then("no workspace remains")]
fn then_no_workspace(world: &RefCell<LifecycleWorld>) -> StepResult {
    let world = world.borrow();
    let dirs = workspace_dirs(world.temp_root.path());
    if !dirs.is_empty() {
        return Err(format!("workspaces left behind: {dirs:?}"));
    }
    if world.settings.layout.pointer_path().exists() {
        return Err(String::from("pointer file left behind"));
    }
    Ok(())
}

#[then("the pointer file names the remaining workspace")]
fn then_pointer_names_remaining(world: &RefCell<LifecycleWorld>) -> StepResult {
    let world = world.borrow();
    let dirs = workspace_dirs(world.temp_root.path());
    let remaining = dirs.first().ok_or("no workspace remains")?;
    let recorded = fs::read_to_string(world.settings.layout.pointer_path())
        .map_err(|error| error.to_string())?;
    if recorded.trim() == remaining.display().to_string() {
        Ok(())
    } else {
        Err(format!("pointer names '{}'", recorded.trim()))
    }
}

#[then("the service has failed")]
fn then_failed(world: &RefCell<LifecycleWorld>) -> StepResult {
    let state = world.borrow().existing_service()?.state();
    if state == LifecycleState::Failed {
        Ok(())
    } else {
        Err(format!("state is {state}"))
    }
}

#[then("the service is stopped")]
fn then_stopped(world: &RefCell<LifecycleWorld>) -> StepResult {
    let world = world.borrow();
    let service = world.existing_service()?;
    if service.state() != LifecycleState::Stopped {
        return Err(format!("state is {}", service.state()));
    }
    if service.health().alive() {
        return Err(String::from("child still reported alive"));
    }
    Ok(())
}

#[then("exactly {count} teardown terminated the child")]
fn then_terminations(world: &RefCell<LifecycleWorld>, count: usize) -> StepResult {
    let teardowns = world.borrow().reporter.teardowns();
    let terminated = teardowns
        .iter()
        .filter(|summary| summary.termination().is_some_and(TerminationOutcome::signalled))
        .count();
    if terminated == count && teardowns.len() == count {
        Ok(())
    } else {
        Err(format!("teardowns: {teardowns:?}"))
    }
}

#[then("exactly {count} teardown was reported")]
fn then_teardowns_reported(world: &RefCell<LifecycleWorld>, count: usize) -> StepResult {
    let teardowns = world.borrow().reporter.teardowns();
    if teardowns.len() == count {
        Ok(())
    } else {
        Err(format!("teardowns: {teardowns:?}"))
    }
}

#[then("exactly {count} teardown removed the workspace")]
fn then_removals(world: &RefCell<LifecycleWorld>, count: usize) -> StepResult {
    let teardowns = world.borrow().reporter.teardowns();
    let removed = teardowns
        .iter()
        .filter(|summary| summary.workspace_removed())
        .count();
    if removed == count {
        Ok(())
    } else {
        Err(format!("teardowns: {teardowns:?}"))
    }
}

#[then("the teardown found the child already exited")]
fn then_already_exited(world: &RefCell<LifecycleWorld>) -> StepResult {
    let teardowns = world.borrow().reporter.teardowns();
    match teardowns.as_slice() {
        [summary] if summary.termination() == Some(TerminationOutcome::AlreadyExited) => Ok(()),
        _ => Err(format!("teardowns: {teardowns:?}")),
    }
}

#[then("the service stops on its own within {seconds} seconds")]
fn then_monitor_stops(world: &RefCell<LifecycleWorld>, seconds: u64) -> StepResult {
    let world = world.borrow();
    let service = world.existing_service()?;
    if wait_until(Duration::from_secs(seconds), || {
        service.state() == LifecycleState::Stopped
    }) {
        Ok(())
    } else {
        Err(format!("state is still {}", service.state()))
    }
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Starting reclaims a leftover workspace and brings the service up"
)]
fn start_reclaims_and_runs(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Stopping twice terminates the child once"
)]
fn stop_twice(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "A hanging dependency step times out"
)]
fn hanging_build_times_out(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "A build that produces no executable fails"
)]
fn missing_artifact_fails(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "A failed workspace can be kept for the next start"
)]
fn failed_workspace_retained(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "A service that exits during startup fails its health check"
)]
fn exiting_service_fails_health_check(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "A service killed externally is still torn down cleanly"
)]
fn killed_service_torn_down(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Concurrent stops tear down exactly once"
)]
fn concurrent_stops(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "The monitor tears down a service whose child died"
)]
fn monitor_tears_down(world: RefCell<LifecycleWorld>) {
    drop(world);
}

#[scenario(
    path = "tests/features/lifecycle.feature",
    name = "Starting after a stop is rejected"
)]
fn start_after_stop_rejected(world: RefCell<LifecycleWorld>) {
    drop(world);
}
