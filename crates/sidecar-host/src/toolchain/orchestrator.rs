use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::{BUILD_TARGET, BuildError, BuildStage, Toolchain};
use crate::process::{self, OutputDrain, StreamKind, signal};
use crate::workspace::Workspace;

const TAIL_LINES: usize = 50;
const KILL_WAIT: Duration = Duration::from_secs(5);
const DRAIN_WAIT: Duration = Duration::from_secs(2);

/// Outcome of a compile stage.
///
/// Successful only when the toolchain exited zero and the executable exists.
#[derive(Debug, Clone)]
pub struct BuildResult {
    status: ExitStatus,
    executable: PathBuf,
    stdout_tail: Vec<String>,
    stderr_tail: Vec<String>,
    elapsed: Duration,
}

impl BuildResult {
    /// Exit status reported by the toolchain.
    #[must_use]
    pub const fn status(&self) -> ExitStatus {
        self.status
    }

    /// Path of the produced executable.
    #[must_use]
    pub fn executable(&self) -> &Path {
        self.executable.as_path()
    }

    /// Last lines the toolchain wrote to stdout.
    #[must_use]
    pub fn stdout_tail(&self) -> &[String] {
        &self.stdout_tail
    }

    /// Last lines the toolchain wrote to stderr.
    #[must_use]
    pub fn stderr_tail(&self) -> &[String] {
        &self.stderr_tail
    }

    /// Wall-clock time the compile stage took.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Exit status alone is not trusted; the artefact must exist too.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.success() && self.executable.is_file()
    }
}

#[derive(Debug)]
struct StageOutput {
    status: ExitStatus,
    stdout_tail: Vec<String>,
    stderr_tail: Vec<String>,
    elapsed: Duration,
}

/// Runs the dependency and compile stages inside a workspace.
pub struct BuildOrchestrator {
    toolchain: Box<dyn Toolchain>,
    timeout: Duration,
}

impl std::fmt::Debug for BuildOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOrchestrator")
            .field("toolchain", &self.toolchain.program())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl BuildOrchestrator {
    /// Builds an orchestrator bounding each stage by `timeout`.
    #[must_use]
    pub fn new(toolchain: Box<dyn Toolchain>, timeout: Duration) -> Self {
        Self { toolchain, timeout }
    }

    /// Bound applied to each stage by [`Self::build`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolves dependencies, then compiles `entry_file` into the workspace's
    /// executable path.
    ///
    /// # Errors
    ///
    /// Returns the first stage's [`BuildError`].
    pub fn build(
        &self,
        workspace: &Workspace,
        entry_file: &str,
    ) -> Result<BuildResult, BuildError> {
        self.resolve_dependencies(workspace, self.timeout)?;
        self.compile(workspace, entry_file, workspace.executable_path(), self.timeout)
    }

    /// Runs the toolchain's dependency step in the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Timeout`] past `timeout` and
    /// [`BuildError::NonZeroExit`] on failure.
    pub fn resolve_dependencies(
        &self,
        workspace: &Workspace,
        timeout: Duration,
    ) -> Result<(), BuildError> {
        let stage = BuildStage::ResolveDependencies;
        let command = self.toolchain.resolve_command();
        let output = self.run_stage(stage, command, workspace.root(), timeout)?;
        ensure_success(stage, &output)
    }

    /// Compiles `entry_file` to `output`, then marks the result executable.
    ///
    /// # Errors
    ///
    /// Returns [`BuildError::Timeout`] past `timeout`,
    /// [`BuildError::NonZeroExit`] on failure and
    /// [`BuildError::MissingArtifact`] when the toolchain exits zero without
    /// writing `output`.
    pub fn compile(
        &self,
        workspace: &Workspace,
        entry_file: &str,
        output: &Path,
        timeout: Duration,
    ) -> Result<BuildResult, BuildError> {
        let stage = BuildStage::Compile;
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|source| BuildError::Io {
                stage,
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let command = self.toolchain.compile_command(entry_file, output);
        let stage_output = self.run_stage(stage, command, workspace.root(), timeout)?;
        ensure_success(stage, &stage_output)?;

        if !output.is_file() {
            return Err(BuildError::MissingArtifact {
                path: output.to_path_buf(),
            });
        }
        mark_executable(output).map_err(|source| BuildError::Io {
            stage,
            path: output.to_path_buf(),
            source,
        })?;

        let result = BuildResult {
            status: stage_output.status,
            executable: output.to_path_buf(),
            stdout_tail: stage_output.stdout_tail,
            stderr_tail: stage_output.stderr_tail,
            elapsed: stage_output.elapsed,
        };
        info!(
            target: BUILD_TARGET,
            executable = %output.display(),
            elapsed_ms = u64::try_from(result.elapsed.as_millis()).unwrap_or(u64::MAX),
            "service executable built"
        );
        Ok(result)
    }

    fn run_stage(
        &self,
        stage: BuildStage,
        mut command: Command,
        work_dir: &Path,
        timeout: Duration,
    ) -> Result<StageOutput, BuildError> {
        let program = self.toolchain.program();
        command
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        signal::isolate_group(&mut command);

        let io_error = |source| BuildError::Io {
            stage,
            path: work_dir.to_path_buf(),
            source,
        };

        let started = Instant::now();
        let mut child = command.spawn().map_err(|source| BuildError::Spawn {
            stage,
            program: program.clone(),
            source,
        })?;
        let pid = child.id();
        info!(
            target: BUILD_TARGET,
            stage = %stage,
            program = %program,
            pid,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "build stage started"
        );

        let mut drains = Vec::with_capacity(2);
        if let Err(source) = capture_output(stage, &mut child, &mut drains) {
            warn!(target: BUILD_TARGET, stage = %stage, pid, %source, "cannot capture build output; killing");
            abandon_stage(&mut child, pid, drains);
            return Err(io_error(source));
        }

        let waited = process::wait_for_exit(&mut child, timeout);
        let status = match waited {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!(target: BUILD_TARGET, stage = %stage, pid, "build stage timed out; killing");
                abandon_stage(&mut child, pid, drains);
                return Err(BuildError::Timeout { stage, timeout });
            }
            Err(source) => {
                abandon_stage(&mut child, pid, drains);
                return Err(io_error(source));
            }
        };

        let mut tails = join_drains(drains).into_iter();
        let stdout_tail = tails.next().unwrap_or_default();
        let stderr_tail = tails.next().unwrap_or_default();
        let elapsed = started.elapsed();
        info!(
            target: BUILD_TARGET,
            stage = %stage,
            %status,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "build stage finished"
        );
        Ok(StageOutput {
            status,
            stdout_tail,
            stderr_tail,
            elapsed,
        })
    }
}

fn ensure_success(stage: BuildStage, output: &StageOutput) -> Result<(), BuildError> {
    if output.status.success() {
        return Ok(());
    }
    Err(BuildError::NonZeroExit {
        stage,
        code: output.status.code(),
        stderr_tail: output.stderr_tail.join("\n"),
    })
}

fn join_drains(drains: Vec<OutputDrain>) -> Vec<Vec<String>> {
    drains
        .into_iter()
        .map(|drain| drain.join_timeout(DRAIN_WAIT))
        .collect()
}

fn capture_output(
    stage: BuildStage,
    child: &mut Child,
    drains: &mut Vec<OutputDrain>,
) -> io::Result<()> {
    if let Some(stdout) = child.stdout.take() {
        drains.push(OutputDrain::spawn(
            stage.label(),
            StreamKind::Stdout,
            stdout,
            TAIL_LINES,
        )?);
    }
    if let Some(stderr) = child.stderr.take() {
        drains.push(OutputDrain::spawn(
            stage.label(),
            StreamKind::Stderr,
            stderr,
            TAIL_LINES,
        )?);
    }
    Ok(())
}

/// Kills a stage that will not be waited on and joins whatever readers it has.
pub(crate) fn abandon_stage(child: &mut Child, pid: u32, drains: Vec<OutputDrain>) {
    kill_stage(child, pid);
    drop(join_drains(drains));
}

fn kill_stage(child: &mut Child, pid: u32) {
    signal::force_kill(pid);
    drop(child.kill());
    match process::wait_for_exit(child, KILL_WAIT) {
        Ok(Some(_)) => {}
        Ok(None) => warn!(target: BUILD_TARGET, pid, "build stage survived kill"),
        Err(error) => warn!(target: BUILD_TARGET, pid, %error, "failed to reap build stage"),
    }
}

#[cfg(unix)]
fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o755);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn mark_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
